use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use colored::Colorize;
use serde_json::json;
use skein_remote::{InMemoryRemote, RemoteObject};
use skein_store::{BlobMapper, EnumeratePage};
use skein_types::{BlobRef, ShardPath};

use crate::cli::*;
use crate::config::CliConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(cli.command, cli.format, &config))
}

async fn dispatch(command: Command, format: OutputFormat, config: &CliConfig) -> anyhow::Result<()> {
    let session = Session::open(config)?;
    match command {
        Command::Put(args) => cmd_put(&session, args, format).await,
        Command::Get(args) => cmd_get(&session, args, format).await,
        Command::Stat(args) => cmd_stat(&session, args, format).await,
        Command::Cat(args) => cmd_cat(&session, args).await,
        Command::Rm(args) => cmd_rm(&session, args, format).await,
        Command::Ls(args) => cmd_ls(&session, args, format).await,
        Command::Shards(args) => cmd_shards(&session, args, format).await,
    }
}

/// A store opened over the local snapshot remote.
struct Session {
    remote: Arc<InMemoryRemote>,
    store: BlobMapper,
    snapshot: PathBuf,
}

impl Session {
    fn open(config: &CliConfig) -> anyhow::Result<Self> {
        let remote = Arc::new(
            InMemoryRemote::open_or_create(&config.snapshot, config.store.root_id.clone())
                .with_context(|| format!("opening {}", config.snapshot.display()))?,
        );
        let store = BlobMapper::new(remote.clone(), config.store.clone())?;
        Ok(Self {
            remote,
            store,
            snapshot: config.snapshot.clone(),
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        self.remote
            .save(&self.snapshot)
            .with_context(|| format!("saving {}", self.snapshot.display()))
    }

    async fn put(&self, args: &PutArgs) -> anyhow::Result<(BlobRef, ShardPath, RemoteObject)> {
        let content = tokio::fs::read(&args.file)
            .await
            .with_context(|| format!("reading {}", args.file.display()))?;
        let blob = match &args.blob {
            Some(s) => BlobRef::parse(s)?,
            None => BlobRef::blake3_of(&content),
        };
        let shard = match &args.shard {
            Some(s) => s.parse::<ShardPath>()?,
            None => self.store.shard_path_for(&blob),
        };
        let object = self.store.put_bytes(&blob, &shard, Bytes::from(content)).await?;
        self.save()?;
        Ok((blob, shard, object))
    }
}

fn parse_ref(s: &str) -> anyhow::Result<BlobRef> {
    BlobRef::parse(s).with_context(|| format!("'{s}' is not a blob reference"))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_put(session: &Session, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (blob, shard, object) = session.put(&args).await?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "blob": blob.to_string(),
            "shard": shard.to_string(),
            "id": object.id,
            "size": object.size,
        })),
        OutputFormat::Text => {
            println!("{} Stored {}", "✓".green().bold(), blob.to_string().yellow());
            println!("  Shard: {}", shard.to_string().cyan());
            println!("  Object: {} ({} bytes)", object.id.dimmed(), object.size);
            Ok(())
        }
    }
}

async fn cmd_get(session: &Session, args: RefArgs, format: OutputFormat) -> anyhow::Result<()> {
    let blob = parse_ref(&args.blob)?;
    let object = session.store.get(&blob).await?;
    match (format, object) {
        (OutputFormat::Json, object) => print_json(&serde_json::to_value(object)?),
        (OutputFormat::Text, Some(object)) => {
            println!("{}", blob.to_string().yellow().bold());
            println!("  Object: {}", object.id);
            println!("  Size: {}", object.size);
            println!("  Parents: {}", object.parents.join(", ").dimmed());
            let uploaded = if object.download_url.is_some() {
                "yes".green()
            } else {
                "no".red()
            };
            println!("  Uploaded: {uploaded}");
            Ok(())
        }
        (OutputFormat::Text, None) => {
            println!("{} not stored", blob.to_string().yellow());
            Ok(())
        }
    }
}

async fn cmd_stat(session: &Session, args: RefArgs, format: OutputFormat) -> anyhow::Result<()> {
    let blob = parse_ref(&args.blob)?;
    let size = session.store.stat(&blob).await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "blob": blob.to_string(), "size": size })),
        OutputFormat::Text => {
            println!("{size}");
            Ok(())
        }
    }
}

async fn cmd_cat(session: &Session, args: CatArgs) -> anyhow::Result<()> {
    let blob = parse_ref(&args.blob)?;
    let (mut reader, _) = session.store.fetch(&blob).await?;
    match &args.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            tokio::io::copy(&mut reader, &mut file).await?;
        }
        None => {
            tokio::io::copy(&mut reader, &mut tokio::io::stdout()).await?;
        }
    }
    Ok(())
}

async fn cmd_rm(session: &Session, args: RefArgs, format: OutputFormat) -> anyhow::Result<()> {
    let blob = parse_ref(&args.blob)?;
    session.store.remove(&blob).await?;
    session.save()?;
    match format {
        OutputFormat::Json => print_json(&json!({ "removed": blob.to_string() })),
        OutputFormat::Text => {
            println!("{} Trashed {}", "✓".green(), blob.to_string().yellow());
            Ok(())
        }
    }
}

async fn cmd_ls(session: &Session, args: LsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let EnumeratePage { items, next } = session
        .store
        .enumerate(args.after.as_deref(), args.limit)
        .await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "items": items, "next": next })),
        OutputFormat::Text => {
            for item in &items {
                println!("{}  {}", item.blob.to_string().yellow(), item.size);
            }
            if let Some(next) = next {
                println!("{} --after {}", "more:".dimmed(), next);
            }
            Ok(())
        }
    }
}

async fn cmd_shards(session: &Session, args: ShardsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (paths, next) = session
        .store
        .list_registrations(args.page_token.as_deref(), args.limit)
        .await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "shards": paths, "next": next })),
        OutputFormat::Text => {
            if paths.is_empty() {
                println!("No shards registered.");
            }
            for path in &paths {
                println!("{}", path.cyan());
            }
            if let Some(next) = next {
                println!("{} --page-token {}", "more:".dimmed(), next);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config_in(dir: &Path) -> CliConfig {
        CliConfig {
            snapshot: dir.join("remote.bin"),
            ..CliConfig::default()
        }
    }

    fn put_args(file: PathBuf) -> PutArgs {
        PutArgs {
            file,
            blob: None,
            shard: None,
        }
    }

    #[tokio::test]
    async fn put_persists_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let file = dir.path().join("data.txt");
        std::fs::write(&file, b"hello skein").unwrap();

        let (blob, shard, object) = Session::open(&config)
            .unwrap()
            .put(&put_args(file))
            .await
            .unwrap();
        assert_eq!(blob, BlobRef::blake3_of(b"hello skein"));
        assert_eq!(shard.len(), 2);
        assert_eq!(object.size, 11);

        let reopened = Session::open(&config).unwrap();
        assert_eq!(reopened.store.stat(&blob).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn put_honors_explicit_ref_and_shard() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, b"x").unwrap();
        let session = Session::open(&config_in(dir.path())).unwrap();

        let args = PutArgs {
            file,
            blob: Some("sha1-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into()),
            shard: Some("zz".into()),
        };
        let (blob, shard, _) = session.put(&args).await.unwrap();
        assert_eq!(blob.to_string(), "sha1-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(shard.to_string(), "zz");
        let (paths, _) = session.store.list_registrations(None, 10).await.unwrap();
        assert_eq!(paths, ["zz"]);
    }

    #[tokio::test]
    async fn put_rejects_bad_ref() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, b"x").unwrap();
        let session = Session::open(&config_in(dir.path())).unwrap();
        let args = PutArgs {
            file,
            blob: Some("md5-abc".into()),
            shard: None,
        };
        assert!(session.put(&args).await.is_err());
        assert!(!dir.path().join("remote.bin").exists(), "nothing saved");
    }

    #[tokio::test]
    async fn rm_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let file = dir.path().join("data.txt");
        std::fs::write(&file, b"bye").unwrap();

        let session = Session::open(&config).unwrap();
        let (blob, _, _) = session.put(&put_args(file)).await.unwrap();
        cmd_rm(&session, RefArgs { blob: blob.to_string() }, OutputFormat::Json)
            .await
            .unwrap();

        let reopened = Session::open(&config).unwrap();
        assert!(reopened.store.get(&blob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cat_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, b"round trip").unwrap();
        let session = Session::open(&config_in(dir.path())).unwrap();
        let (blob, _, _) = session.put(&put_args(file)).await.unwrap();

        let out = dir.path().join("out.txt");
        cmd_cat(
            &session,
            CatArgs {
                blob: blob.to_string(),
                output: Some(out.clone()),
            },
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"round trip");
    }

    #[tokio::test]
    async fn cat_of_missing_blob_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&config_in(dir.path())).unwrap();
        let args = CatArgs {
            blob: BlobRef::blake3_of(b"never stored").to_string(),
            output: None,
        };
        assert!(cmd_cat(&session, args).await.is_err());
    }
}
