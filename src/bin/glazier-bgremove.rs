//! glazier-bgremove command-line tool
//!
//! Removes the background from an image with an ONNX segmentation model,
//! using either the ONNX Runtime or the Tract backend.

#[cfg(feature = "cli")]
use glazier_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match cli::main().await {
        Err(err) if cli::is_interrupted(&err) => {
            eprintln!("{err}");
            std::process::exit(cli::INTERRUPTED_EXIT_CODE);
        },
        result => result,
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
