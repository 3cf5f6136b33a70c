//! `querylens model` - install and inspect local GGUF models.

use querylens_core::{local_ai_paths, LlamaCppServer, ModelManager, DEFAULT_LOCAL_AI_PORT};
use std::path::Path;

fn report(context: &str) -> impl Fn(querylens_core::LocalAIError) -> miette::Report + '_ {
    move |e| miette::miette!("{}: {}", context, e)
}

pub(crate) fn list() -> miette::Result<()> {
    let installed = ModelManager::new()
        .list_installed()
        .map_err(report("Cannot read models directory"))?;

    if installed.is_empty() {
        println!("No GGUF models installed. Fetch the default one with:");
        println!("    querylens model pull");
        return Ok(());
    }

    for name in &installed {
        println!("{}", name);
    }
    if let Ok(dir) = local_ai_paths::models_dir() {
        eprintln!("({} in {})", installed.len(), dir.display());
    }

    Ok(())
}

/// Download the default model, or copy `path` into the models directory.
pub(crate) async fn pull(path: Option<&Path>) -> miette::Result<()> {
    let manager = ModelManager::new();
    local_ai_paths::ensure_dirs().map_err(report("Cannot create data directories"))?;

    match path {
        Some(source) => {
            if source.extension().and_then(|e| e.to_str()) != Some("gguf") {
                return Err(miette::miette!(
                    "{} is not a .gguf file",
                    source.display()
                ));
            }
            let dest = manager
                .install_from_path(source)
                .map_err(report("Install failed"))?;
            println!("Installed {}", dest.display());
        }
        None => {
            let model = ModelManager::default_model();
            if manager.is_installed(&model.filename) {
                println!("{} is already installed", model.filename);
                return Ok(());
            }

            println!("Fetching {} ({})", model.name, model.url);
            let dest = manager
                .download_default()
                .await
                .map_err(report("Download failed"))?;
            println!("Saved to {}", dest.display());
        }
    }

    Ok(())
}

/// Delete `name` from the models directory.
pub(crate) fn remove(name: &str) -> miette::Result<()> {
    let filename = if name.ends_with(".gguf") {
        name.to_string()
    } else {
        format!("{}.gguf", name)
    };

    let manager = ModelManager::new();
    if !manager.is_installed(&filename) {
        println!("{} is not installed", filename);
        return Ok(());
    }
    manager.remove(&filename).map_err(report("Remove failed"))?;
    println!("Removed {}", filename);

    Ok(())
}

/// Print where models and the server binary live.
pub(crate) fn info() -> miette::Result<()> {
    let data_dir = local_ai_paths::data_dir().map_err(report("No data directory"))?;
    let binary = local_ai_paths::llama_server_path().map_err(report("No data directory"))?;
    let models = local_ai_paths::models_dir().map_err(report("No data directory"))?;
    let default_model = ModelManager::default_model();
    let server = LlamaCppServer::new(default_model.filename.as_str());

    println!("data dir       {}", data_dir.display());
    println!("models         {}", models.display());
    println!(
        "llama-server   {}{}",
        binary.display(),
        if server.binary_exists() { "" } else { " (missing)" }
    );
    println!(
        "default model  {}{}",
        server.model_filename(),
        if server.model_exists() { "" } else { " (not installed)" }
    );
    println!("port           {}", DEFAULT_LOCAL_AI_PORT);

    Ok(())
}
