//! ALFA Reveal - CLI
//!
//! Command-line interface for revealing, sealing and measuring page content.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use walkdir::WalkDir;

use alfa_reveal::authoring::{sealed_elements, AnnotateReport, SizeAnnotator};
use alfa_reveal::crypto::{self, attrs, HashAlgorithm, SealParams};
use alfa_reveal::fetch::Flow;
use alfa_reveal::reveal::encrypted::recipe_for;
use alfa_reveal::{
    Document, HttpTransport, PageContext, PageEvent, ProgressiveFetcher, RevealConfig, RevealPage,
};

#[derive(Parser)]
#[command(name = "alfa-reveal")]
#[command(author = "Karen Tonoyan")]
#[command(version = alfa_reveal::VERSION)]
#[command(about = "ALFA Reveal - Passphrase-locked content and on-demand media")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a document through the page runtime
    Reveal {
        /// Document (JSON)
        document: PathBuf,

        /// Unlock an encrypted block: ID=PASSPHRASE
        #[arg(short, long)]
        unlock: Vec<String>,

        /// Click-load a media placeholder by id
        #[arg(short, long)]
        load: Vec<String>,

        /// Write the resulting document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save fetched media into this directory
        #[arg(long)]
        assets: Option<PathBuf>,

        /// Page query string (e.g. "nocrypt")
        #[arg(long, default_value = "")]
        query: String,

        /// Treat the page as served from an insecure context
        #[arg(long)]
        insecure: bool,
    },

    /// Decrypt raw parameters
    Decrypt {
        /// Salt (base64)
        #[arg(long)]
        salt: String,

        /// IV (base64)
        #[arg(long)]
        init: String,

        /// PBKDF2 hash
        #[arg(long, default_value = "SHA-256")]
        hash: String,

        /// GCM tag (hex)
        #[arg(long)]
        tag: String,

        /// PBKDF2 iterations
        #[arg(long)]
        iterations: u32,

        /// Ciphertext (hex)
        #[arg(long)]
        content: String,

        /// Passphrase
        #[arg(short, long)]
        passphrase: String,
    },

    /// Encrypt a file into metadata + placeholder elements
    Seal {
        /// Plaintext file (usually an HTML fragment)
        input: PathBuf,

        /// Passphrase
        #[arg(short, long)]
        passphrase: String,

        /// PBKDF2 iterations
        #[arg(long, default_value_t = 100_000)]
        iterations: u32,

        /// PBKDF2 hash
        #[arg(long, default_value = "SHA-256")]
        hash: String,

        /// Id of the metadata element
        #[arg(long, default_value = "encryption-info")]
        id: String,

        /// Id of the encrypted placeholder
        #[arg(long)]
        placeholder_id: Option<String>,
    },

    /// Download a URL with a progress bar
    Fetch {
        /// Media URL
        url: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write data-content-size on every media placeholder under a directory
    Annotate {
        /// Document or directory of documents (JSON)
        path: PathBuf,

        /// Site root for absolute media paths (defaults to PATH)
        #[arg(long)]
        site_root: Option<PathBuf>,
    },

    /// Print the external decryption recipe for an encrypted block
    Recipe {
        /// Document (JSON)
        document: PathBuf,

        /// Id of the encrypted placeholder
        id: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RevealConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Reveal {
            document,
            unlock,
            load,
            output,
            assets,
            query,
            insecure,
        } => {
            let doc = read_document(&document)?;
            let mut context = PageContext::from_config(&config).with_query(query);
            if insecure {
                context.secure_context = false;
            }

            let mut page = RevealPage::new(doc, fetcher(&config)?, &config, context);
            page.dispatch(PageEvent::DocumentReady).await?;

            for id in &load {
                let node = page
                    .document()
                    .element_by_id(id)
                    .ok_or_else(|| anyhow!("no element with id {}", id))?;
                match page.dispatch(PageEvent::Click(node)).await {
                    Ok(()) => eprintln!("🖼️  Loaded {}", id),
                    Err(e) => eprintln!("⚠️  {}: {}", id, e),
                }
            }

            for entry in &unlock {
                let (id, passphrase) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--unlock expects ID=PASSPHRASE"))?;
                let node = page
                    .document()
                    .element_by_id(id)
                    .ok_or_else(|| anyhow!("no element with id {}", id))?;

                page.dispatch(PageEvent::Input {
                    node,
                    passphrase: SecretString::new(passphrase.to_string()),
                })
                .await?;
                match page.dispatch(PageEvent::Submit(node)).await {
                    Ok(()) => eprintln!("🔓 Unlocked {}", id),
                    Err(e) => eprintln!("❌ {}: {}", id, e),
                }
            }

            let summary = page.summary();
            eprintln!(
                "📊 media: {} loaded, {} waiting, {} failed | encrypted: {} unlocked, {} locked",
                summary.media.resolved,
                summary.media.awaiting,
                summary.media.failed,
                summary.encrypted.resolved,
                summary.encrypted.awaiting + summary.encrypted.failed,
            );

            let doc = page.into_document();
            if let Some(dir) = assets {
                write_assets(&doc, &dir)?;
            }
            write_document(&doc, output.as_deref())?;
        }

        Commands::Decrypt {
            salt,
            init,
            hash,
            tag,
            iterations,
            content,
            passphrase,
        } => {
            let mut attributes = BTreeMap::new();
            attributes.insert(attrs::SALT.to_string(), salt);
            attributes.insert(attrs::INIT.to_string(), init);
            attributes.insert(attrs::HASH.to_string(), hash);
            attributes.insert(attrs::TAG.to_string(), tag);
            attributes.insert(attrs::ITERATIONS.to_string(), iterations.to_string());

            let metadata = crypto::EncryptionMetadata::from_attributes(&attributes)?;
            let ciphertext = crypto::decode_hex(&content)?;
            let passphrase = SecretString::new(passphrase);

            let plaintext = tokio::task::spawn_blocking(move || {
                crypto::decrypt(&passphrase, &metadata, &ciphertext)
            })
            .await??;

            println!("{}", String::from_utf8_lossy(&plaintext));
        }

        Commands::Seal {
            input,
            passphrase,
            iterations,
            hash,
            id,
            placeholder_id,
        } => {
            let plaintext = std::fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let params = SealParams {
                hash: HashAlgorithm::parse(&hash).ok_or_else(|| anyhow!("unknown hash {}", hash))?,
                iterations,
            };
            let sealed = crypto::seal(&plaintext, &SecretString::new(passphrase), &params)?;

            let (info, placeholder) = sealed_elements(&sealed, &id, placeholder_id.as_deref());
            let doc = Document::from_elements(vec![info, placeholder]);
            println!("{}", doc.to_json_pretty()?);
        }

        Commands::Fetch { url, output } => {
            let fetcher = fetcher(&config)?;

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner} {bytes}/{total_bytes} [{bar:40.cyan/blue}] {elapsed} {msg}",
                )?
                .progress_chars("=>-"),
            );

            let blob = fetcher
                .fetch_with_progress(&url, |progress| {
                    if let Some(total) = progress.total {
                        pb.set_length(total);
                    }
                    pb.set_position(progress.received);
                    Flow::Continue
                })
                .await?;
            pb.finish_with_message(config.size_units.format(blob.len() as u64));

            std::fs::write(&output, &blob.bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("✅ Saved to: {}", output.display());
        }

        Commands::Annotate { path, site_root } => {
            let fetcher = fetcher(&config)?;
            let site_root = site_root.unwrap_or_else(|| path.clone());
            let mut annotator = SizeAnnotator::new(&fetcher, site_root);
            let mut total = AnnotateReport::default();

            for entry in WalkDir::new(&path).into_iter().filter_map(|e| e.ok()) {
                let file = entry.path();
                if !entry.file_type().is_file()
                    || file.extension().and_then(|e| e.to_str()) != Some("json")
                {
                    continue;
                }

                let mut doc = match read_document(file) {
                    Ok(doc) => doc,
                    Err(e) => {
                        log::warn!("Skipping {}: {:#}", file.display(), e);
                        continue;
                    }
                };
                let doc_dir = file.parent().unwrap_or_else(|| Path::new("."));
                let report = annotator.annotate(&mut doc, doc_dir).await;

                if report.measured + report.failed > 0 {
                    write_document(&doc, Some(file))?;
                    println!(
                        "📏 {}: {} measured, {} unmeasurable",
                        file.display(),
                        report.measured,
                        report.failed
                    );
                }
                total.merge(report);
            }

            println!(
                "✅ Done: {} measured, {} inline skipped, {} unmeasurable",
                total.measured, total.skipped, total.failed
            );
        }

        Commands::Recipe { document, id } => {
            let doc = read_document(&document)?;
            let node = doc
                .element_by_id(&id)
                .ok_or_else(|| anyhow!("no element with id {}", id))?;
            let recipe = recipe_for(&doc, node)?;

            println!("🔗 {}", recipe.link);
            println!("{:-<60}", "");
            print!("{}", recipe.input);
        }
    }

    Ok(())
}

fn fetcher(config: &RevealConfig) -> anyhow::Result<ProgressiveFetcher<HttpTransport>> {
    let fetcher = ProgressiveFetcher::new(HttpTransport::new(&config.user_agent)?);
    Ok(match &config.base_url {
        Some(base) => fetcher.with_base_url(base)?,
        None => fetcher,
    })
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Document::from_json(&raw).with_context(|| format!("{} is not a document", path.display()))
}

fn write_document(doc: &Document, path: Option<&Path>) -> anyhow::Result<()> {
    let json = doc.to_json_pretty()?;
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn write_assets(doc: &Document, dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;

    for (url, blob) in doc.objects() {
        let name = url.rsplit('/').next().unwrap_or(url);
        let ext = match blob.content_type.as_deref() {
            Some("image/png") => "png",
            Some("image/jpeg") => "jpg",
            Some("image/gif") => "gif",
            Some("image/webp") => "webp",
            Some(ct) if ct.starts_with("image/svg") => "svg",
            _ => "bin",
        };
        let path = dir.join(format!("media-{}.{}", name, ext));
        if path.exists() {
            bail!("refusing to overwrite {}", path.display());
        }
        std::fs::write(&path, &blob.bytes)?;
        println!("💾 {}", path.display());
    }
    Ok(())
}
