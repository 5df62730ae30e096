use clap::{Args, Parser, Subcommand};
use stencil_forge::catalog::Catalog;
use stencil_forge::types::{PaperSize, StencilPatch};
use stencil_forge::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stencil-forge")]
#[command(about = "Turn photos into printable tattoo stencils")]
#[command(long_about = "\
Turn photos into printable tattoo stencils

Each stencil keeps its original photo untouched. Edits (rotation, mirroring,
brightness, contrast) always re-render from that original, so nothing is lost
no matter how often you change your mind.

Storage layout:

  stencils/
  ├── settings.toml     # Optional settings (see gen-config)
  ├── stencils.json     # Stencil metadata
  ├── originals/        # Untouched source photos
  ├── processed/        # Current rendered stencil per project
  ├── exports/          # Print-ready renders (pruned after retention.export_days)
  └── cache/            # Thumbnails

Set RUST_LOG=debug to see every pipeline stage.
Run 'stencil-forge gen-config' to generate a documented settings.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding the catalog
    #[arg(long, default_value = "stencils", global = true)]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a stencil from an image file
    Create {
        image: PathBuf,
        /// Print width in centimeters (defaults to printer.default_width_cm)
        #[arg(long)]
        width_cm: Option<f64>,
        #[arg(long)]
        name: Option<String>,
    },
    /// List stencils, most recently edited first
    List {
        #[arg(long)]
        favorites_first: bool,
    },
    /// Find stencils by name or client note
    Search { query: String },
    /// Show every detail of one stencil
    Show { id: String },
    /// Change a stencil's settings
    Update(UpdateArgs),
    /// Delete a stencil and its files
    Delete { id: String },
    /// Copy a stencil under a new id
    Duplicate { id: String },
    /// Render a print-ready PNG into exports/
    Export {
        id: String,
        /// Pure black and white for direct-thermal printers
        #[arg(long)]
        thermal: bool,
    },
    /// Counts and disk usage
    Stats,
    /// Delete expired exports
    Cleanup,
    /// Remove orphaned files and report stencils with missing files
    Reconcile,
    /// Print a stock settings.toml with all options documented
    GenConfig,
}

#[derive(Args)]
struct UpdateArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    width_cm: Option<f64>,
    #[arg(long)]
    mirror_h: Option<bool>,
    #[arg(long)]
    mirror_v: Option<bool>,
    /// Clockwise rotation: 0, 90, 180 or 270
    #[arg(long)]
    rotation: Option<u32>,
    /// 0-100
    #[arg(long)]
    contrast: Option<i32>,
    /// -50..50
    #[arg(long, allow_negative_numbers = true)]
    brightness: Option<i32>,
    #[arg(long)]
    paper_size: Option<PaperSize>,
    #[arg(long, conflicts_with = "clear_note")]
    note: Option<String>,
    #[arg(long)]
    clear_note: bool,
    #[arg(long)]
    favorite: Option<bool>,
}

impl UpdateArgs {
    fn into_patch(self) -> (String, StencilPatch) {
        let client_note = if self.clear_note {
            Some(None)
        } else {
            self.note.map(Some)
        };
        let patch = StencilPatch {
            name: self.name,
            width_cm: self.width_cm,
            is_mirrored_h: self.mirror_h,
            is_mirrored_v: self.mirror_v,
            rotation_degrees: self.rotation,
            contrast_level: self.contrast,
            brightness_level: self.brightness,
            paper_size: self.paper_size,
            client_note,
            is_favorite: self.favorite,
        };
        (self.id, patch)
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    std::fs::create_dir_all(&cli.base_dir)?;
    let settings = config::load_settings(&cli.base_dir)?;
    let catalog = Catalog::open(&cli.base_dir, settings)?;
    let pruned = catalog.cleanup().await?;

    match cli.command {
        Command::Create {
            image,
            width_cm,
            name,
        } => {
            let bytes = std::fs::read(&image)?;
            let width_cm = width_cm.unwrap_or(catalog.settings().printer.default_width_cm);
            let record = catalog.create_stencil(bytes, width_cm, name).await?;
            output::print_stencil_detail(&record);
        }
        Command::List { favorites_first } => {
            let favorites_first = favorites_first || catalog.settings().ui.favorites_first;
            output::print_stencil_list(&catalog.get_all_stencils(favorites_first).await?);
        }
        Command::Search { query } => {
            output::print_stencil_list(&catalog.search_stencils(&query).await?);
        }
        Command::Show { id } => match catalog.get_stencil(&id).await? {
            Some(record) => output::print_stencil_detail(&record),
            None => return Err(format!("No stencil with id {id}").into()),
        },
        Command::Update(args) => {
            let (id, patch) = args.into_patch();
            let record = catalog.update_stencil(&id, patch).await?;
            output::print_stencil_detail(&record);
        }
        Command::Delete { id } => {
            catalog.delete_stencil(&id).await?;
            println!("Deleted {id}");
        }
        Command::Duplicate { id } => {
            let copy = catalog.duplicate_stencil(&id).await?;
            output::print_stencil_detail(&copy);
        }
        Command::Export { id, thermal } => {
            let thermal = thermal || catalog.settings().printer.thermal_mode;
            let path = catalog.export_stencil(&id, thermal).await?;
            println!("{}", cli.base_dir.join(path).display());
        }
        Command::Stats => {
            output::print_stats(&catalog.get_statistics().await?);
        }
        Command::Cleanup => {
            // Every command prunes at startup; report what that removed.
            println!("Removed {pruned} expired export(s)");
        }
        Command::Reconcile => {
            output::print_reconcile_report(&catalog.reconcile().await?);
        }
        // Handled before the catalog is opened.
        Command::GenConfig => {}
    }

    Ok(())
}
