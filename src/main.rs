#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;

use clap::Parser;
use eframe::egui;

use md_preview::app::{LaunchOptions, PreviewApp};
use md_preview::error::ExportError;
use md_preview::render;
use md_preview::scroll::ACTIVATION_OFFSET;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "md-preview")]
#[command(about = "Preview markdown files with a scroll-synchronized table of contents", long_about = None)]
struct Args {
    /// Markdown file to open
    file: Option<PathBuf>,

    /// Enable live reload (watch for file changes)
    #[arg(short, long)]
    watch: bool,

    /// Render FILE to a standalone HTML page at this path and exit
    #[arg(short, long, value_name = "OUT")]
    export: Option<PathBuf>,

    /// Distance below the top of the viewport at which a heading becomes active
    #[arg(long, value_name = "POINTS", default_value_t = ACTIVATION_OFFSET)]
    activation_offset: f32,
}

fn main() -> eframe::Result<()> {
    env_logger::init();

    let args = Args::parse();

    if let Some(output) = &args.export {
        let result = match &args.file {
            Some(input) => render::export_file(input, output),
            None => Err(ExportError::NoDocument),
        };
        if let Err(e) = result {
            log::error!("Export failed: {}", e);
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 720.0])
            .with_min_inner_size([400.0, 300.0])
            .with_title("Markdown Previewer")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let launch = LaunchOptions {
        file: args.file,
        watch: args.watch,
        activation_offset: args.activation_offset,
    };

    eframe::run_native(
        "md-preview",
        options,
        Box::new(move |cc| Ok(Box::new(PreviewApp::new(cc, launch)))),
    )
}
