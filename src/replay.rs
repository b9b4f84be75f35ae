//! Replays a series of hierarchy dumps through a hierarchy module, printing
//! the tree and label list every time a pass reports a change.

use std::sync::Arc;

use anyhow::{bail, Result};
use hiersync::{
    ChangeBus, DumpFeed, HierarchyModule, RecordId, SharedTree, SyncConfig, TreeSynchronizer,
};
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<String>,
    ignore: Vec<RecordId>,
    quiet: bool,
    dumps: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        ignore: Vec::new(),
        quiet: false,
        dumps: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-config" => {
                i += 1;
                if i >= args.len() {
                    bail!("-config requires a file path argument");
                }
                parsed.config = Some(args[i].clone());
            }
            "-ignore" => {
                i += 1;
                if i >= args.len() {
                    bail!("-ignore requires a node id argument");
                }
                parsed.ignore.push(args[i].parse()?);
            }
            "-quiet" => parsed.quiet = true,
            "-h" | "-help" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Warning: Unknown argument: {}", other);
            }
            path => parsed.dumps.push(path.to_string()),
        }
        i += 1;
    }

    if parsed.dumps.is_empty() {
        print_help();
        bail!("at least one dump file is required");
    }
    Ok(parsed)
}

fn print_help() {
    println!("Hierarchy dump replayer");
    println!("Usage: hiersync-replay [OPTIONS] <DUMP>...");
    println!();
    println!("OPTIONS:");
    println!("  -config <FILE>         JSON config (default: platform config dir)");
    println!("  -ignore <ID>           Exclude a node and its subtree (repeatable)");
    println!("  -quiet                 Print pass summaries only");
    println!("  -h, -help, --help      Show this help message");
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::load_default()?,
    };
    init_logging(&config.log_filter);

    let mut ignore = config.ignore_list();
    ignore.extend(args.ignore.iter().copied());

    let feed = DumpFeed::new();
    feed.load(&args.dumps[0])?;

    let synchronizer = TreeSynchronizer::with_policy(
        feed.source(),
        feed.labels(config.label_policy()),
        ignore,
        config.label_policy(),
    );
    let module = HierarchyModule::new(synchronizer).into_shared();

    if !args.quiet {
        let names = feed.clone();
        module.borrow_mut().add_tree_consumer(move |tree: &SharedTree<RecordId>| {
            let dump = names.current();
            for (depth, node) in tree.borrow().walk() {
                let name = dump.name_of(*node.key()).unwrap_or("?");
                let labels: Vec<&str> = node.labels().iter().map(|l| &**l).collect();
                println!("{}{} #{} [{}]", "  ".repeat(depth), name, node.key(), labels.join(", "));
            }
        });
        module.borrow_mut().add_label_consumer(|labels: &[Arc<str>]| {
            let labels: Vec<&str> = labels.iter().map(|l| &**l).collect();
            println!("labels: {}", labels.join(", "));
        });
    }

    let mut bus = ChangeBus::new();
    let changed = HierarchyModule::start(&module, &mut bus)?;
    println!("{}: changed={} {:?}", args.dumps[0], changed, module.borrow().last_pass());

    for path in &args.dumps[1..] {
        feed.load(path)?;
        bus.emit();
        let stats = module.borrow().last_pass();
        println!("{}: changed={} {:?}", path, stats.changed, stats);
    }

    module.borrow_mut().stop(&mut bus)?;
    Ok(())
}
