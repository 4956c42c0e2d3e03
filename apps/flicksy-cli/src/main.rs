mod project;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use flicksy_bundle::{
    Bundle, HtmlDocument, embed_in_document, extract_from_document, from_portable,
};
use flicksy_persist::{
    DEFAULT_FAMILY, DEFAULT_SLOT, DirBackend, MemoryBackend, ProjectStore, StorageConfig,
    StoreError,
};
use tracing_subscriber::EnvFilter;

use project::{Flicksy3Project, ProjectHistory, blank_bundle, manifest, new_history, paint_scene};

#[derive(Parser)]
#[command(name = "flicksy", about = "Create, paint and share flicksy projects")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding saved slots
    #[arg(long, global = true, default_value = ".flicksy")]
    store: PathBuf,

    /// Project family the slots belong to
    #[arg(long, global = true, default_value = DEFAULT_FAMILY)]
    family: String,

    /// Slot to operate on
    #[arg(long, global = true, default_value = DEFAULT_SLOT)]
    slot: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a blank project into the slot
    New {
        /// Replace a project already saved in the slot
        #[arg(long)]
        force: bool,
    },
    /// Print the scenes and resources saved in the slot
    Info,
    /// Fill a rectangle of a scene's texture as one undoable edit
    Paint {
        #[arg(long, default_value = "1")]
        scene: u32,
        #[arg(long, default_value = "0")]
        x: u32,
        #[arg(long, default_value = "0")]
        y: u32,
        #[arg(long, default_value = "16")]
        width: u32,
        #[arg(long, default_value = "16")]
        height: u32,
        /// Fill color as #rrggbb or #rrggbbaa
        #[arg(long)]
        color: String,
    },
    /// Write the slot into an HTML page that carries its own save data
    Export {
        #[arg(long)]
        out: PathBuf,
        /// Page to embed into instead of a blank one
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Read the save data embedded in an HTML page into the slot
    Import {
        #[arg(long)]
        doc: PathBuf,
    },
    /// List saved slots
    Slots,
    /// Remove the slot
    Delete,
    /// Walk through a fork, undo and redo session in memory
    Demo,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = StorageConfig {
        root: cli.store.clone(),
        family: cli.family.clone(),
    };
    let slot = cli.slot.as_str();

    match cli.command {
        Commands::New { force } => {
            let mut store = config.open()?;
            if !force && store.slots()?.iter().any(|s| s == slot) {
                anyhow::bail!("slot {slot:?} already holds a project; pass --force to replace it");
            }
            store.save_decoded(slot, &blank_bundle())?;
            println!("created blank project in {}/{slot}", config.family);
        }
        Commands::Info => {
            let store = config.open()?;
            print_info(&store, slot)?;
        }
        Commands::Paint {
            scene,
            x,
            y,
            width,
            height,
            color,
        } => {
            let color = project::parse_color(&color)?;
            let mut store = config.open()?;
            let mut history = load_or_blank(&store, slot)?;
            let texture = paint_scene(&mut history, scene, x, y, width, height, color)?;
            store.save(slot, &history.make_bundle()?)?;
            println!("painted scene {scene}: texture is now resource {texture}");
        }
        Commands::Export { out, template } => {
            let store = config.open()?;
            let bundle: Bundle<Flicksy3Project> = store.load_portable(slot)?;
            let mut doc = match template {
                Some(path) => HtmlDocument::new(read_text(&path)?),
                None => HtmlDocument::blank("flicksy"),
            };
            embed_in_document(&mut doc, &bundle)?;
            std::fs::write(&out, doc.as_str())
                .with_context(|| format!("writing {}", out.display()))?;
            println!("exported {}/{slot} to {}", config.family, out.display());
        }
        Commands::Import { doc } => {
            let page = HtmlDocument::new(read_text(&doc)?);
            let Some(bundle) = extract_from_document::<Flicksy3Project>(&page)? else {
                println!("{} carries no embedded project; nothing imported", doc.display());
                return Ok(());
            };
            // Load before saving so a broken page never overwrites the slot.
            let mut history = new_history();
            history.load_portable(bundle)?;
            let mut store = config.open()?;
            store.save(slot, &history.make_bundle()?)?;
            println!("imported {} into {}/{slot}", doc.display(), config.family);
        }
        Commands::Slots => {
            let slots = config.open()?.slots()?;
            if slots.is_empty() {
                println!("no saved slots in {}", config.family);
            }
            for name in slots {
                println!("{name}");
            }
        }
        Commands::Delete => {
            if config.open()?.delete(slot)? {
                println!("deleted {}/{slot}", config.family);
            } else {
                println!("{}/{slot} was already empty", config.family);
            }
        }
        Commands::Demo => run_demo()?,
    }

    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Load a slot into a fresh history, starting from a blank project if the slot is empty.
fn load_or_blank(store: &ProjectStore<DirBackend>, slot: &str) -> anyhow::Result<ProjectHistory> {
    let bundle = match store.load::<Flicksy3Project>(slot) {
        Ok(bundle) => bundle,
        Err(StoreError::NotFound(_)) => {
            tracing::info!(slot, "slot is empty, starting from a blank project");
            blank_bundle()
        }
        Err(e) => return Err(e.into()),
    };
    let mut history = new_history();
    history.load_bundle(bundle)?;
    Ok(history)
}

fn print_info(store: &ProjectStore<DirBackend>, slot: &str) -> anyhow::Result<()> {
    let portable: Bundle<Flicksy3Project> = store.load_portable(slot)?;
    let decoded = from_portable(portable.clone(), store.codecs())?;

    println!("{}/{slot}", store.family());
    println!("scenes: {}", decoded.project.scenes.len());
    for scene in &decoded.project.scenes {
        match decoded.resources.get(&scene.texture) {
            Some(surface) => println!(
                "  scene {}: texture {} ({}x{})",
                scene.id,
                scene.texture,
                surface.width(),
                surface.height()
            ),
            None => println!("  scene {}: texture {} (missing)", scene.id, scene.texture),
        }
    }
    println!("resources: {}", portable.resources.len());
    for (id, resource) in &portable.resources {
        println!("  {id}: {} ({} bytes)", resource.kind, resource.data.len());
    }
    Ok(())
}

/// Fork a texture, edit it, undo, redo, branch, and round-trip through a store.
fn run_demo() -> anyhow::Result<()> {
    let mut history = new_history();
    history.subscribe(|change, project: &Flicksy3Project| {
        println!("  [{change:?}] textures {:?}", manifest(project));
    });

    println!("load blank project:");
    history.load_bundle(blank_bundle())?;

    println!("paint scene 1 red:");
    let red = paint_scene(&mut history, 1, 0, 0, 32, 32, [255, 0, 0, 255])?;
    let bundle = history.make_bundle()?;
    println!(
        "  bundle carries {:?}; store holds {:?}",
        bundle.resources.keys().collect::<Vec<_>>(),
        history.resources().ids().collect::<Vec<_>>()
    );

    println!("undo:");
    history.undo();
    println!("redo:");
    history.redo();
    println!("undo again:");
    history.undo();

    println!("paint scene 1 blue (discards the redo branch):");
    let blue = paint_scene(&mut history, 1, 0, 0, 32, 32, [0, 0, 255, 255])?;
    println!(
        "  resource {red} {}; store holds {:?}",
        if history.resources().contains(red) {
            "kept"
        } else {
            "collected"
        },
        history.resources().ids().collect::<Vec<_>>()
    );
    println!(
        "  can undo: {}, can redo: {}",
        history.can_undo(),
        history.can_redo()
    );

    let mut store = ProjectStore::new(DEFAULT_FAMILY, MemoryBackend::new());
    store.save(DEFAULT_SLOT, &history.make_bundle()?)?;
    let reloaded = store.load::<Flicksy3Project>(DEFAULT_SLOT)?;
    let same = history.present() == Some(&reloaded.project)
        && reloaded.resources.get(&blue) == history.resources().get(blue).ok();
    println!("saved and reloaded {DEFAULT_SLOT}: identical = {same}");
    Ok(())
}
