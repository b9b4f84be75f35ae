//! Writes a random base hierarchy dump followed by a series of mutated
//! snapshots, for feeding `hiersync-replay`.

use anyhow::{bail, Result};
use hiersync::{DumpWriter, VirtualHierarchy};

struct Config {
    seed: u64,
    max_depth: usize,
    max_children: usize,
    steps: usize,
    edits_per_step: usize,
    prefix: String,
    use_brotli: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 42,
            max_depth: 3,
            max_children: 4,
            steps: 5,
            edits_per_step: 1,
            prefix: "scene".to_string(),
            use_brotli: false,
        }
    }
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.as_str()),
        None => bail!("{} requires an argument", flag),
    }
}

fn parse_args() -> Result<Config> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-seed" => config.seed = next_value(&args, &mut i, "-seed")?.parse()?,
            "-depth" => config.max_depth = next_value(&args, &mut i, "-depth")?.parse()?,
            "-children" => config.max_children = next_value(&args, &mut i, "-children")?.parse()?,
            "-steps" => config.steps = next_value(&args, &mut i, "-steps")?.parse()?,
            "-edits" => config.edits_per_step = next_value(&args, &mut i, "-edits")?.parse()?,
            "-out" => config.prefix = next_value(&args, &mut i, "-out")?.to_string(),
            "-brotli" => config.use_brotli = true,
            "-h" | "-help" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("Warning: Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_help() {
    println!("Hierarchy dump generator");
    println!("Usage: hiersync-gen [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -seed <N>              Random seed (default: 42)");
    println!("  -depth <N>             Maximum depth of the base hierarchy (default: 3)");
    println!("  -children <N>          Maximum children per node (default: 4)");
    println!("  -steps <N>             Number of mutated snapshots (default: 5)");
    println!("  -edits <N>             Random edits between snapshots (default: 1)");
    println!("  -out <PREFIX>          Output file prefix (default: scene)");
    println!("  -brotli                Write compressed dumps (*.hier.br)");
    println!("  -h, -help, --help      Show this help message");
}

fn main() -> Result<()> {
    let config = parse_args()?;
    let extension = if config.use_brotli { "hier.br" } else { "hier" };

    let mut hierarchy = VirtualHierarchy::with_config(config.max_depth, config.max_children, config.seed);

    for step in 0..=config.steps {
        if step > 0 {
            for _ in 0..config.edits_per_step {
                let mutation = hierarchy.mutate();
                println!("step {}: {:?}", step, mutation);
            }
        }

        let path = format!("{}_{:03}.{}", config.prefix, step, extension);
        let mut writer = DumpWriter::new(&path)?;
        writer.write_dump(&hierarchy.to_dump())?;
        println!("Dump written to: {} ({} nodes)", path, hierarchy.node_count());
    }

    Ok(())
}
