//! `nuconvert convert` command

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};

use crate::cli::ConvertArgs;
use nuconvert::core::legacy_manifest::LEGACY_MANIFEST_NAME;
use nuconvert::core::DEPENDENCIES_FILE_NAME;
use nuconvert::ops::{apply, convert, ApplyOptions, ConvertOptions, FileAction};
use nuconvert::sources::nuget_config::default_user_config_path;
use nuconvert::sources::{CredentialsMigrationMode, FileCredentialStore, UnsupportedDecryptor};
use nuconvert::util::config::{global_config_path, load_config, project_config_path};
use nuconvert::util::diagnostic::suggestions;
use nuconvert::util::fs;
use nuconvert::util::shell::{Shell, Status};

pub fn execute(args: ConvertArgs, shell: &Shell) -> Result<()> {
    let started = Instant::now();

    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("failed to get current directory")?,
    };
    let config = load_config(global_config_path().as_deref(), &project_config_path(&root));

    let credentials = match args.credentials {
        Some(mode) => mode.parse::<CredentialsMigrationMode>()?,
        None => config.credentials_mode()?.unwrap_or_default(),
    };

    let mut excluded = config.convert.exclude.clone();
    excluded.extend(args.exclude);

    let options = ConvertOptions {
        root: root.clone(),
        dependencies_file: args
            .dependencies
            .or_else(|| config.convert.dependencies_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEPENDENCIES_FILE_NAME)),
        force: args.force,
        credentials,
        user_config: if args.no_user_config {
            None
        } else {
            default_user_config_path()
        },
        excluded,
    };

    shell.status(Status::Converting, root.display());

    let state = match convert(&options, &UnsupportedDecryptor, shell) {
        Ok(state) => state,
        Err(failure) => {
            for error in failure.errors() {
                shell.diagnostic(&error.to_diagnostic());
            }
            bail!("could not convert {}", root.display());
        }
    };

    if shell.is_verbose() {
        for file in &state.legacy.config_files {
            shell.note(format!("read {}", file.display()));
        }
    }
    if state.legacy.manifests.is_empty() {
        shell.warn(format!("no {} found", LEGACY_MANIFEST_NAME));
        if !shell.is_quiet() {
            eprintln!("{}", suggestions::NO_LEGACY_MANIFESTS);
        }
    }
    for diagnostic in &state.diagnostics {
        shell.diagnostic(diagnostic);
    }

    let mut store = FileCredentialStore::user_default()
        .context("could not find a home directory for the credential store")?;
    let apply_options = ApplyOptions {
        dry_run: args.dry_run,
        keep_legacy_files: args.keep_legacy_files
            || config.convert.keep_legacy_files.unwrap_or(false),
    };
    let report = apply(&state, &mut store, &apply_options)?;

    for (action, path) in &report.files {
        let status = match action {
            FileAction::Created => Status::Created,
            FileAction::Updated => Status::Updated,
            FileAction::Removed => Status::Removed,
        };
        shell.status(status, fs::relative_path(&root, path).display());
    }
    for source in &report.stored_credentials {
        shell.status(
            Status::Stored,
            format!("credentials for {} in {}", source, store.path().display()),
        );
    }

    if report.dry_run {
        shell.note("dry run, nothing was written");
        return Ok(());
    }

    let packages = state
        .dependencies_file
        .as_ref()
        .map(|f| f.packages().len())
        .unwrap_or(0);
    shell.finished(
        started.elapsed(),
        format!("{} package(s) in {}", packages, options.dependencies_file.display()),
    );
    if !shell.is_quiet() {
        eprintln!("{}", suggestions::RESTORE_AFTER_CONVERT);
    }

    Ok(())
}
