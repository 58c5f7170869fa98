use std::path::PathBuf;

use maze3d::config::{parse_size, RunConfig};
use maze3d::controller::{Controller, NavigationMode};
use maze3d::episode::RewardShaping;
use maze3d::evaluate::evaluate;
use maze3d::generator::GoalRule;
use maze3d::observation::ObservationProfile;
use maze3d::observer::render_ascii_slice;
use maze3d::policy::{GoalSeekingPolicy, PolicyPort, QNetworkPolicy, RandomPolicy};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;

/// Logs go to `writer`; stdout is reserved for the report.
fn log_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt().with_writer(writer).finish()
}

fn main() {
    log_subscriber(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cmd, rest) = match args.first().map(String::as_str) {
        None => ("eval", &args[..]),
        Some("--help" | "-h" | "help") => {
            print_help();
            return;
        }
        Some(c) if c.starts_with("--") => ("eval", &args[..]),
        Some(c) => (c, &args[1..]),
    };

    let opts = match Options::parse(rest) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            print_help();
            std::process::exit(2);
        }
    };

    let result = match cmd {
        "eval" => run_eval(&opts),
        "show" => run_show(&opts),
        other => Err(format!("unknown command: {other}")),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("maze3d (3D maze navigation runner)");
    println!("usage:");
    println!("  maze3d [eval] [options]     play episodes and report rewards");
    println!("  maze3d show [options]       print one maze layer by layer");
    println!();
    println!("options:");
    println!("  --episodes N                episodes to evaluate (default 10)");
    println!("  --size XxYxZ                extents, rounded up to odd (default 11x11x5)");
    println!("  --seed N                    first maze seed");
    println!("  --max-steps N               step cap (default 4 * cell count)");
    println!("  --mode path|policy          navigation mode (default policy)");
    println!("  --policy random|goal|FILE   policy, or Q-network weights JSON (default goal)");
    println!("  --profile flags|spatial     observation layout (default flags)");
    println!("  --goal farthest|far_corner  goal placement rule");
    println!("  --sparse                    goal-only reward");
}

struct Options {
    config: RunConfig,
    episodes: usize,
    policy: String,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut config = RunConfig {
            mode: NavigationMode::Policy,
            ..RunConfig::default()
        };
        let mut episodes = 10usize;
        let mut policy = "goal".to_string();

        let mut it = args.iter();
        while let Some(flag) = it.next() {
            let mut value = || {
                it.next()
                    .cloned()
                    .ok_or_else(|| format!("missing value for {flag}"))
            };
            match flag.as_str() {
                "--episodes" => {
                    episodes = value()?
                        .parse()
                        .map_err(|_| "invalid --episodes".to_string())?
                }
                "--size" => config.size = parse_size(&value()?).map_err(|e| e.to_string())?,
                "--seed" => {
                    config.seed = Some(value()?.parse().map_err(|_| "invalid --seed".to_string())?)
                }
                "--max-steps" => {
                    config.max_steps =
                        Some(value()?.parse().map_err(|_| "invalid --max-steps".to_string())?)
                }
                "--mode" => {
                    let v = value()?;
                    config.mode =
                        NavigationMode::parse(&v).ok_or_else(|| format!("unknown mode: {v}"))?
                }
                "--profile" => {
                    let v = value()?;
                    config.profile = ObservationProfile::parse(&v)
                        .ok_or_else(|| format!("unknown profile: {v}"))?
                }
                "--goal" => {
                    let v = value()?;
                    config.goal_rule =
                        GoalRule::parse(&v).ok_or_else(|| format!("unknown goal rule: {v}"))?
                }
                "--policy" => policy = value()?,
                "--sparse" => config.reward = RewardShaping::sparse(),
                other => return Err(format!("unknown option: {other}")),
            }
        }

        config.validate().map_err(|e| e.to_string())?;
        Ok(Self {
            config,
            episodes,
            policy,
        })
    }

    fn load_policy(&self) -> Result<Box<dyn PolicyPort>, String> {
        match self.policy.as_str() {
            "random" | "none" => Ok(Box::new(RandomPolicy)),
            "goal" | "goal_seeking" => Ok(Box::new(GoalSeekingPolicy)),
            path => {
                let p = PathBuf::from(path);
                let net = QNetworkPolicy::load(&p)
                    .map_err(|e| format!("loading {}: {e}", p.display()))?;
                Ok(Box::new(net))
            }
        }
    }
}

fn run_eval(opts: &Options) -> Result<(), String> {
    let policy = opts.load_policy()?;
    let report = evaluate(&opts.config, policy.as_ref(), opts.episodes);

    for (i, e) in report.episodes.iter().enumerate() {
        println!(
            "Episode {:>3}: reward={:+8.2} steps={:>5} goal={} seed={}",
            i + 1,
            e.reward,
            e.steps,
            if e.reached_goal { "yes" } else { "no" },
            e.seed
        );
    }
    println!();
    println!("policy:        {}", report.policy);
    println!("episodes:      {}", report.episodes.len());
    println!("success rate:  {:.1}%", report.success_rate() * 100.0);
    println!("avg reward:    {:+.2}", report.mean_reward());
    if let Some(max) = report.max_reward() {
        println!("max reward:    {max:+.2}");
    }
    println!("avg steps:     {:.1}", report.mean_steps());
    Ok(())
}

fn run_show(opts: &Options) -> Result<(), String> {
    let controller = Controller::new(opts.config.clone());
    let ep = controller.episode();
    let dims = ep.grid.dims();
    println!(
        "maze {dims} seed={} start={} goal={} open={} path_len={}",
        controller.seed(),
        ep.start,
        ep.goal,
        ep.grid.open_count(),
        controller.follower().path().len()
    );
    for z in 0..dims.z as i32 {
        println!("z={z}");
        print!("{}", render_ascii_slice(ep, z));
    }
    Ok(())
}
