use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use sc2_map_editor::objects::{to_legacy, LegacySchema};
use sc2_map_editor::{unit_census, MapEditor, SceneConfig};

#[derive(Parser)]
#[command(name = "sc2-map-edit")]
#[command(about = "Inspect SC2 map terrain and rearrange placed units")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print terrain statistics
    Terrain {
        map: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List placed units
    Units {
        map: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Sample safe unit positions
    Positions {
        map: PathBuf,
        #[arg(long, default_value = "10")]
        count: usize,
        #[arg(long, default_value = "2.0")]
        min_distance: f64,
        #[arg(long)]
        no_avoid_edges: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write an edited copy of a map
    Edit(EditArgs),
    /// Render the height map to a PNG
    #[cfg(feature = "preview")]
    Preview { map: PathBuf, out: PathBuf },
}

#[derive(Args)]
struct EditArgs {
    source: PathBuf,
    dest: PathBuf,
    /// Scene description (JSON)
    #[arg(long, conflicts_with = "task", required_unless_present = "task")]
    scene: Option<PathBuf>,
    /// Task file with `agent` and `enemy` unit groups
    #[arg(long)]
    task: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
}

fn rng_from(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let editor = MapEditor::new();

    match cli.command {
        Command::Terrain { map, json } => {
            let terrain = editor.analyze_terrain(&map)?;
            match terrain.summary() {
                Some(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
                Some(summary) => println!("{summary}"),
                None => eprintln!("{} has no usable height map", map.display()),
            }
        }
        Command::Units { map, json } => {
            let list = editor.read_objects(&map)?;
            if json {
                let units = to_legacy(&list.records, LegacySchema::UnitsOnly);
                println!("{}", serde_json::to_string_pretty(&units)?);
            } else {
                for unit in list.units() {
                    println!(
                        "{:>8}  P{}  {:<24} {}",
                        unit.id, unit.player, unit.unit_type, unit.position
                    );
                }
                eprintln!();
                for ((player, unit_type), count) in unit_census(&list.records) {
                    eprintln!("P{player} {unit_type}: {count}");
                }
                eprintln!("{} records, {} units", list.records.len(), list.units().count());
            }
        }
        Command::Positions { map, count, min_distance, no_avoid_edges, seed } => {
            let terrain = editor.analyze_terrain(&map)?;
            let placements =
                terrain.find_placements_with(&mut rng_from(seed), count, min_distance, !no_avoid_edges);
            for placement in &placements {
                println!("{}\t{:?}", placement.position, placement.tier);
            }
        }
        Command::Edit(args) => {
            let scene = match (&args.scene, &args.task) {
                (Some(path), _) => SceneConfig::from_json(&std::fs::read_to_string(path)?)?,
                (None, Some(path)) => SceneConfig::from_task_json(&std::fs::read_to_string(path)?)?,
                (None, None) => return Err("either --scene or --task is required".into()),
            };
            let (p1, p2) = scene.unit_totals();
            eprintln!(
                "Editing {} -> {} ({} units for player 1, {} for player 2)",
                args.source.display(),
                args.dest.display(),
                p1,
                p2
            );

            let report = editor.edit_map_with(&mut rng_from(args.seed), &args.source, &args.dest, &scene)?;
            eprintln!(
                "Done: {} removed, {} replaced, {} added, {} records total",
                report.removed,
                report.replaced,
                report.added,
                report.records.len()
            );
        }
        #[cfg(feature = "preview")]
        Command::Preview { map, out } => {
            let terrain = editor.analyze_terrain(&map)?;
            let grid = terrain
                .height_grid()
                .ok_or_else(|| format!("{} has no usable height map", map.display()))?;
            let image = sc2_map_editor::terrain::height_preview(grid);
            image.save(&out)?;
            eprintln!("Wrote {}x{} preview to {}", image.width(), image.height(), out.display());
        }
    }

    Ok(())
}
