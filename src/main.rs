use clap::Parser;
use popset::sets::SuperSet;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Inspect bit-packed membership sets over a shared population
#[derive(Parser, Debug)]
#[command(name = "popset")]
#[command(about = "Inspect bit-packed membership sets over a shared population", long_about = None)]
struct Args {
    /// Path to a JSON manifest describing the population and its sets
    #[arg(short, long)]
    manifest: String,

    /// Pair of set names to intersect, e.g. "staff,oncall"
    #[arg(long, value_delimiter = ',', num_args = 2)]
    intersect: Option<Vec<String>>,

    /// Pair of set names to union, e.g. "staff,oncall"
    #[arg(long, value_delimiter = ',', num_args = 2)]
    union: Option<Vec<String>>,

    /// Print the members of each set in addition to its summary
    #[arg(long)]
    members: bool,
}

/// On-disk description of a superset: the population in index order, the
/// members that are logically deleted, and the sets to build over it.
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    #[serde(default)]
    description: String,
    population: Vec<String>,
    #[serde(default)]
    deleted: Vec<String>,
    #[serde(default)]
    sets: Vec<SetEntry>,
}

/// One named set: either an explicit member list or a base64 payload
/// produced by an earlier run.
#[derive(Debug, Deserialize)]
struct SetEntry {
    name: String,
    #[serde(default)]
    members: Option<Vec<String>>,
    #[serde(default)]
    base64: Option<String>,
}

fn build_superset(manifest: Manifest) -> SuperSet<String> {
    let mut superset = SuperSet::new(&manifest.name, &manifest.description, manifest.population);

    for member in &manifest.deleted {
        superset
            .remove_member(member)
            .expect("deleted member not in population");
    }

    for entry in &manifest.sets {
        match (&entry.members, &entry.base64) {
            (_, Some(encoded)) => {
                superset
                    .add_set_from_base64(&entry.name, encoded)
                    .expect("incompatible base64 membership");
            }
            (Some(members), None) => {
                superset
                    .add_set_with_members(&entry.name, members)
                    .expect("set member not in population");
            }
            (None, None) => {
                superset.add_set(&entry.name).expect("duplicate set name");
            }
        }
    }

    superset
}

fn print_set(superset: &SuperSet<String>, set: &popset::sets::PackedSet, with_members: bool) {
    println!(
        "{:<40} count={:<6} base64={}",
        set.name(),
        set.count(),
        set.to_base64()
    );
    if with_members {
        let members: Vec<_> = set.iter_members(superset).cloned().collect();
        println!("    members: {}", members.join(", "));
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.manifest).expect("manifest not readable");
    let manifest: Manifest = serde_json::from_str(&raw).expect("malformed manifest");

    let superset = build_superset(manifest);
    info!(
        superset = superset.name(),
        population = superset.population_size(),
        active = superset.count(),
        "loaded superset"
    );

    println!(
        "{} - {} ({} members, {} active)",
        superset.name(),
        superset.description(),
        superset.population_size(),
        superset.count()
    );

    let mut set_names: Vec<_> = superset.set_names().map(str::to_string).collect();
    set_names.sort_unstable();
    for name in &set_names {
        let set = superset.set(name).expect("listed set resolves");
        print_set(&superset, set, args.members);
    }

    if let Some(pair) = &args.intersect {
        let result = superset
            .intersect_sets(&pair[0], &pair[1])
            .expect("unknown set name");
        print_set(&superset, &result, args.members);
    }

    if let Some(pair) = &args.union {
        let result = superset
            .union_sets(&pair[0], &pair[1])
            .expect("unknown set name");
        print_set(&superset, &result, args.members);
    }
}
