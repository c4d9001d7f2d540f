// src/main.rs
use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use env_logger::Builder;
use imgfs::gc::compact;
use imgfs::http_server::HttpServer;
use imgfs::service::{ImgfsService, DEFAULT_LISTENING_PORT};
use imgfs::{Dimensions, ImgFs, ImgfsError, ImgfsHeader, ListMode, OpenMode, Resolution};
use log::{error, info, warn, LevelFilter};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

const DEFAULT_MAX_FILES: u32 = 128;
const DEFAULT_THUMB_RES: u16 = 64;
const DEFAULT_SMALL_RES: u16 = 256;
const MAX_THUMB_RES: u16 = 128;
const MAX_SMALL_RES: u16 = 512;

#[derive(Parser)]
#[command(name = "imgfs")]
#[command(version = "1.0.0")]
#[command(about = "Single-file image store with deduplication and lazily cached variants")]
struct Cli {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the header and every stored image
    List {
        file: PathBuf,
    },
    /// Create a new, empty imgFS file
    Create {
        file: PathBuf,
        /// Maximum number of images
        #[arg(long, default_value_t = DEFAULT_MAX_FILES)]
        max_files: u32,
        /// Thumbnail box, at most 128x128
        #[arg(long, num_args = 2, value_names = ["X_RES", "Y_RES"],
              default_values_t = [DEFAULT_THUMB_RES, DEFAULT_THUMB_RES])]
        thumb_res: Vec<u16>,
        /// Small-variant box, at most 512x512
        #[arg(long, num_args = 2, value_names = ["X_RES", "Y_RES"],
              default_values_t = [DEFAULT_SMALL_RES, DEFAULT_SMALL_RES])]
        small_res: Vec<u16>,
    },
    /// Read an image and save it as <IMG_ID>_<res>.jpg
    Read {
        file: PathBuf,
        img_id: String,
        /// original|orig|thumbnail|thumb|small
        #[arg(default_value = "original")]
        res: String,
    },
    /// Insert an image read from disk
    Insert {
        file: PathBuf,
        img_id: String,
        image: PathBuf,
    },
    /// Delete an image
    Delete {
        file: PathBuf,
        img_id: String,
    },
    /// Serve the imgFS file over HTTP
    Serve {
        file: PathBuf,
        #[arg(env = "IMGFS_PORT", default_value_t = DEFAULT_LISTENING_PORT)]
        port: u16,
    },
    /// Rewrite the file without unreferenced content
    Gc {
        file: PathBuf,
        tmp: PathBuf,
    },
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    Builder::new()
    .format(|buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(buf, "[{} {}] {}",
                 buf.timestamp_seconds(),
                 style.value(record.level()),
                 record.args()
        )
    })
    .filter(None, level)
    .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        init_logger(cli.verbose);
    } else {
        env_logger::init();
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ImgfsError>()
        .map(ImgfsError::code)
        .unwrap_or_else(|| ImgfsError::Runtime(String::new()).code())
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::List { file } => {
            let fs = open(&file, OpenMode::ReadOnly)?;
            print!("{}", fs.list(ListMode::Text)?);
        }
        Command::Create { file, max_files, thumb_res, small_res } => {
            let thumb = resolution_box(&thumb_res, MAX_THUMB_RES)?;
            let small = resolution_box(&small_res, MAX_SMALL_RES)?;
            ImgFs::create(&file, ImgfsHeader::new(max_files, thumb, small))
                .with_context(|| format!("creating {:?}", file))?
                .close();
            println!("{} item(s) written", 1 + u64::from(max_files));
        }
        Command::Read { file, img_id, res } => {
            let resolution: Resolution = res.parse()?;
            let mut fs = open(&file, OpenMode::ReadWrite)?;
            let image = fs.read(&img_id, resolution)?;
            fs.close();

            let out = output_name(&img_id, resolution);
            std::fs::write(&out, &image).map_err(ImgfsError::from)?;
            info!("Wrote {} bytes to {}", image.len(), out);
        }
        Command::Insert { file, img_id, image } => {
            let bytes = std::fs::read(&image)
                .map_err(ImgfsError::from)
                .with_context(|| format!("reading {:?}", image))?;
            let mut fs = open(&file, OpenMode::ReadWrite)?;
            fs.insert(&bytes, &img_id)?;
            fs.close();
        }
        Command::Delete { file, img_id } => {
            let mut fs = open(&file, OpenMode::ReadWrite)?;
            fs.delete(&img_id)?;
            fs.close();
        }
        Command::Serve { file, port } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(ImgfsError::from)?;
            runtime.block_on(serve(&file, port))?;
        }
        Command::Gc { file, tmp } => {
            let stats = compact(&file, &tmp)?;
            println!(
                "kept {} image(s), reclaimed {} byte(s)",
                stats.kept,
                stats.reclaimed()
            );
        }
    }
    Ok(())
}

fn open(file: &Path, mode: OpenMode) -> anyhow::Result<ImgFs> {
    Ok(ImgFs::open(file, mode).with_context(|| format!("opening {:?}", file))?)
}

/// Validate a `W H` pair against `1..=max`.
fn resolution_box(values: &[u16], max: u16) -> Result<Dimensions, ImgfsError> {
    match values {
        [w, h] if (1..=max).contains(w) && (1..=max).contains(h) => Ok(Dimensions::new(*w, *h)),
        [_, _] => Err(ImgfsError::InvalidResolution),
        _ => Err(ImgfsError::NotEnoughArguments),
    }
}

fn output_name(img_id: &str, resolution: Resolution) -> String {
    format!("{}_{}.jpg", img_id, resolution.suffix())
}

// --- Server ---

async fn serve(file: &Path, port: u16) -> anyhow::Result<()> {
    let fs = open(file, OpenMode::ReadWrite)?;
    print!("{}", fs.header());

    let store = Arc::new(Mutex::new(fs));
    let service = Arc::new(ImgfsService::new(Arc::clone(&store), port));

    let server = match HttpServer::bind(any_addr(port), service.clone()) {
        Ok(server) => server,
        Err(e) if port != DEFAULT_LISTENING_PORT => {
            warn!("Cannot listen on port {} ({}), falling back to {}", port, e, DEFAULT_LISTENING_PORT);
            HttpServer::bind(any_addr(DEFAULT_LISTENING_PORT), service.clone())?
        }
        Err(e) => return Err(e.into()),
    };

    let bound = server.local_addr()?.port();
    service.set_port(bound);
    println!("ImgFS server started on http://localhost:{}", bound);

    server.serve_until(shutdown_signal()).await?;

    info!("Shutting down...");
    drop(service);
    drop(store);
    Ok(())
}

fn any_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
