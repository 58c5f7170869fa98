//! CLI client for the `mazed` daemon.
//!
//! Examples:
//!   maze3d-cli status
//!   maze3d-cli start
//!   maze3d-cli frame
//!   maze3d-cli mode policy
//!   maze3d-cli new 42
//!   maze3d-cli set size 15x15x7
//!
//! By default it talks to 127.0.0.1:9877; override with `--addr host:port`.

use maze3d::config::parse_size;
use maze3d::controller::NavigationMode;
use maze3d::generator::GoalRule;
use maze3d::observation::ObservationProfile;
use maze3d::observer::{FrameSnapshot, StatsSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetFrame { include_path: bool },
    GetStats,
    CfgGet,
    CfgSet { settings: Value },
    Start,
    Stop,
    NewMaze { seed: Option<u64> },
    SetMode { mode: String },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    Frame(FrameSnapshot),
    Stats {
        running: bool,
        frame: u64,
        generation: u64,
        policy: String,
        summary: StatsSummary,
    },
    Config(Value),
    Success { message: String },
    Error { message: String },
}

fn usage() -> ! {
    eprintln!("maze3d-cli (talks to mazed @ 127.0.0.1:9877 by default)");
    eprintln!("Usage: maze3d-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                      Show run state and episode stats");
    eprintln!("  frame [z] [--path]          Show the current frame (layer z, default agent's)");
    eprintln!("  start | stop                Control run loop");
    eprintln!("  mode <path_follow|policy>   Switch navigation mode");
    eprintln!("  new [seed]                  Replace the maze now");
    eprintln!("  config                      Print daemon settings");
    eprintln!("  set <key> <value>           Change a setting: size, seed, max_steps,");
    eprintln!("                              goal, profile, fps, weights");
    eprintln!("  shutdown                    Save settings and exit daemon");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = "127.0.0.1:9877".to_string();
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let mut stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("set_read_timeout: {e}"))?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);

    let line = serde_json::to_string(req).map_err(|e| format!("serialize: {e}"))?;
    stream
        .write_all(line.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|e| format!("send: {e}"))?;

    let mut resp_line = String::new();
    reader
        .read_line(&mut resp_line)
        .map_err(|e| format!("recv: {e}"))?;
    serde_json::from_str(&resp_line).map_err(|e| format!("parse response: {e}"))
}

fn print_frame(f: &FrameSnapshot, layer: Option<i32>) {
    println!(
        "maze {} gen={} seed={} mode={} agent={} goal={} steps={}/{} done={} reward={:+.2}",
        f.dims,
        f.generation,
        f.seed,
        f.mode.name(),
        f.agent,
        f.goal,
        f.steps_taken,
        f.max_steps,
        f.done,
        f.episode_reward,
    );
    if let (Some(r), Some(ev)) = (f.last_reward, f.last_event) {
        println!("last: {} {:+.3}", ev.as_str(), r);
    }
    if !f.path.is_empty() {
        println!("route: {} cells", f.path.len());
    }
    let z = layer
        .unwrap_or(f.agent.z)
        .clamp(0, (f.dims.z as i32 - 1).max(0));
    println!("z={z}");
    print!("{}", f.render_slice(z));
}

/// Apply `key = value` to the settings JSON returned by `CfgGet`.
fn edit_settings(settings: &mut Value, key: &str, value: &str) -> Result<(), String> {
    let run = settings
        .get_mut("run")
        .ok_or_else(|| "daemon settings have no `run` section".to_string())?;
    let set = |v: &mut Value, k: &str, new: Value| {
        if let Some(obj) = v.as_object_mut() {
            obj.insert(k.to_string(), new);
        }
    };
    match key {
        "size" => {
            let size = parse_size(value).map_err(|e| e.to_string())?;
            set(run, "size", serde_json::json!(size));
        }
        "seed" => {
            let seed = if value == "none" {
                Value::Null
            } else {
                serde_json::json!(value.parse::<u64>().map_err(|_| "seed must be a number")?)
            };
            set(run, "seed", seed);
        }
        "max_steps" => {
            let steps = if value == "none" || value == "0" {
                Value::Null
            } else {
                serde_json::json!(value
                    .parse::<u32>()
                    .map_err(|_| "max_steps must be a number")?)
            };
            set(run, "max_steps", steps);
        }
        "goal" => {
            let g = GoalRule::parse(value).ok_or("goal must be farthest|far_corner")?;
            set(run, "goal_rule", serde_json::json!(g));
        }
        "profile" => {
            let p = ObservationProfile::parse(value).ok_or("profile must be flags|spatial")?;
            set(run, "profile", serde_json::json!(p));
        }
        "mode" => {
            let m = NavigationMode::parse(value).ok_or("mode must be path_follow|policy")?;
            set(run, "mode", serde_json::json!(m));
        }
        "fps" => {
            let fps: u32 = value.parse().map_err(|_| "fps must be a number (1-1000)")?;
            set(settings, "target_fps", serde_json::json!(fps));
        }
        "weights" => {
            let w = if value == "none" {
                Value::Null
            } else {
                Value::String(value.to_string())
            };
            set(settings, "policy_weights", w);
        }
        other => return Err(format!("unknown setting: {other}")),
    }
    Ok(())
}

fn main() {
    let (addr, args) = parse_args();
    let cmd = &args[0];

    let make_error = |msg: &str| -> ! {
        eprintln!("{}", msg);
        process::exit(1);
    };

    let mut layer: Option<i32> = None;

    let req = match cmd.as_str() {
        "status" => Request::GetStats,
        "frame" => {
            let mut include_path = false;
            for a in &args[1..] {
                if a == "--path" {
                    include_path = true;
                } else {
                    layer = Some(
                        a.parse()
                            .unwrap_or_else(|_| make_error("layer must be a number")),
                    );
                }
            }
            Request::GetFrame { include_path }
        }
        "start" => Request::Start,
        "stop" => Request::Stop,
        "mode" => {
            if args.len() < 2 {
                usage();
            }
            Request::SetMode {
                mode: args[1].clone(),
            }
        }
        "new" => {
            let seed = args.get(1).map(|s| {
                s.parse::<u64>()
                    .unwrap_or_else(|_| make_error("seed must be a number"))
            });
            Request::NewMaze { seed }
        }
        "config" => Request::CfgGet,
        "set" => {
            if args.len() < 3 {
                usage();
            }
            let mut settings = match send_request(&addr, &Request::CfgGet) {
                Ok(Response::Config(v)) => v,
                Ok(Response::Error { message }) => make_error(&format!("Error: {message}")),
                Ok(_) => make_error("unexpected response to CfgGet"),
                Err(e) => make_error(&format!("Failed: {e}")),
            };
            if let Err(e) = edit_settings(&mut settings, &args[1], &args[2]) {
                make_error(&e);
            }
            Request::CfgSet { settings }
        }
        "shutdown" => Request::Shutdown,
        _ => usage(),
    };

    match send_request(&addr, &req) {
        Ok(Response::Frame(f)) => print_frame(&f, layer),
        Ok(Response::Stats {
            running,
            frame,
            generation,
            policy,
            summary: s,
        }) => {
            println!(
                "running={} frame={} generation={} policy={}",
                running, frame, generation, policy
            );
            println!(
                "episodes={} solved={} rate={:.1}% recent={:.1}% avg_reward={:+.2} avg_steps={:.1} best={}",
                s.episodes,
                s.successes,
                s.success_rate * 100.0,
                s.recent_rate * 100.0,
                s.mean_reward,
                s.mean_steps,
                s.best_reward
                    .map(|b| format!("{b:+.2}"))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        Ok(Response::Config(v)) => match serde_json::to_string_pretty(&v) {
            Ok(text) => println!("{text}"),
            Err(e) => make_error(&format!("Failed: {e}")),
        },
        Ok(Response::Success { message }) => println!("{message}"),
        Ok(Response::Error { message }) => {
            eprintln!("Error: {message}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed: {e}");
            process::exit(1);
        }
    }
}
