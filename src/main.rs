use anchor_patch::config::{
    apply_patches, check_patches, load_from_path, ApplicationError, PatchResult,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "anchor-patch")]
#[command(about = "Anchored text patching for web app workspaces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patches to a workspace
    Apply {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific patch file to apply (otherwise applies all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Check status of patches without applying
    Status {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Verify patches are already applied to the current workspace
    Verify {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// List available patches and their version constraints
    List {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            workspace,
            patches,
            dry_run,
            diff,
        } => cmd_apply(workspace, patches, dry_run, diff),

        Commands::Status { workspace } => cmd_status(workspace),

        Commands::Verify { workspace } => cmd_verify(workspace),

        Commands::List { workspace } => cmd_list(workspace),
    }
}

/// Helper: Discover all .toml patch files in a patches/ directory.
///
/// Discovery order:
/// 1. `<workspace>/patches` (allows keeping patch files alongside the target).
/// 2. `./patches` relative to the current working directory (typical when
///    running from the anchor-patch repo).
fn discover_patch_files(workspace: &Path) -> Result<Vec<PathBuf>> {
    let cwd_patches_dir = env::current_dir().ok().map(|cwd| cwd.join("patches"));
    let workspace_patches_dir = workspace.join("patches");

    let candidate_dirs: Vec<PathBuf> = std::iter::once(workspace_patches_dir)
        .chain(cwd_patches_dir.into_iter())
        .collect();

    for patches_dir in candidate_dirs {
        if !patches_dir.exists() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&patches_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml patch files found in either ./patches or {}/patches",
        workspace.display()
    )
}

/// Resolve workspace path using multiple detection strategies
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. ANCHOR_PATCH_WORKSPACE environment variable
/// 3. Auto-detect from current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    // 1. Explicit flag (highest priority)
    if let Some(path) = cli_workspace {
        return Ok(path.canonicalize()?);
    }

    // 2. Environment variable
    if let Ok(env_path) = env::var("ANCHOR_PATCH_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: ANCHOR_PATCH_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    // 3. Auto-detect from current directory
    if let Some(path) = auto_detect_workspace() {
        println!(
            "{}",
            format!("Auto-detected workspace: {}", path.display()).dimmed()
        );
        return Ok(path);
    }

    // 4. Helpful error with multiple solutions
    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find target workspace.".red(),
        "Try one of:".bold(),
        "1. cd into the app directory: cd /path/to/app && anchor-patch apply",
        "2. Specify explicitly: anchor-patch apply --workspace /path/to/app",
        "3. Set environment variable: export ANCHOR_PATCH_WORKSPACE=/path/to/app"
    )
}

/// Auto-detect workspace by walking up from current directory
fn auto_detect_workspace() -> Option<PathBuf> {
    let current = env::current_dir().ok()?;

    // Walk up looking for a package.json next to a patches/ directory
    for ancestor in current.ancestors() {
        let package_json = ancestor.join("package.json");
        if package_json.exists() && ancestor.join("patches").exists() {
            return Some(ancestor.to_path_buf());
        }
    }

    None
}

/// Helper: Read workspace version from package.json
fn read_workspace_version(workspace: &Path) -> Result<String> {
    let manifest_path = workspace.join("package.json");
    let manifest = fs::read_to_string(&manifest_path)?;
    let parsed: serde_json::Value = serde_json::from_str(&manifest)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", manifest_path.display()))?;

    parsed
        .get("version")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow::anyhow!("no version field in {}", manifest_path.display())
        })
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn workspace_version_or_default(workspace: &Path) -> String {
    read_workspace_version(workspace).unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: Could not read workspace version from package.json, using 0.0.0".yellow()
        );
        "0.0.0".to_string()
    })
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    patches: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    // 1. Resolve workspace path
    let workspace = resolve_workspace(workspace)?;

    // 2. Determine patch files to load
    let patch_files = if let Some(path) = patches {
        vec![path]
    } else {
        discover_patch_files(&workspace)?
    };

    // 3. Determine workspace version
    let workspace_version = workspace_version_or_default(&workspace);

    println!("Workspace: {}", workspace.display());
    println!("Version: {}", workspace_version);
    println!();

    // 4. Load and apply each patch file
    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_skipped = 0;
    let mut total_failed = 0;

    for patch_file in patch_files {
        println!("Loading patches from {}...", patch_file.display());

        let config = load_from_path(&patch_file)?;

        // Capture file contents before applying (for diff output).
        // Only read files that the patches will touch, to avoid reading
        // unrelated files in large workspaces.
        let mut file_contents_before: HashMap<PathBuf, String> = HashMap::new();
        if show_diff && !dry_run {
            let target_files: std::collections::HashSet<PathBuf> = config
                .patches
                .iter()
                .map(|p| {
                    if config.meta.workspace_relative {
                        workspace.join(&p.file)
                    } else {
                        PathBuf::from(&p.file)
                    }
                })
                .collect();
            for file_path in target_files {
                if file_path.exists() {
                    if let Ok(content) = fs::read_to_string(&file_path) {
                        file_contents_before.insert(file_path, content);
                    }
                }
            }
        }

        // Apply patches (or dry-run against in-memory documents only)
        let results = if dry_run {
            println!("{}", "  [DRY RUN - no files will be modified]".cyan());
            check_patches(&config, &workspace, &workspace_version)
        } else {
            apply_patches(&config, &workspace, &workspace_version)
        };

        // 5. Report results
        for (patch_id, result) in results {
            match result {
                Ok(PatchResult::Applied { ref file }) => {
                    if dry_run {
                        println!(
                            "{} {}: Would apply to {}",
                            "✓".green(),
                            patch_id,
                            file.display()
                        );
                    } else {
                        println!(
                            "{} {}: Applied to {}",
                            "✓".green(),
                            patch_id,
                            file.display()
                        );
                    }
                    total_applied += 1;

                    if show_diff && !dry_run {
                        if let Some(before) = file_contents_before.get(file) {
                            if let Ok(after) = fs::read_to_string(file) {
                                if before != &after {
                                    display_diff(file, before, &after);
                                }
                            }
                        }
                    }
                }
                Ok(PatchResult::AlreadyApplied { file }) => {
                    println!(
                        "{} {}: Already applied to {}",
                        "⊙".yellow(),
                        patch_id,
                        file.display()
                    );
                    total_already_applied += 1;
                }
                Ok(PatchResult::SkippedVersion { reason }) => {
                    println!("{} {}: Skipped ({})", "⊘".cyan(), patch_id, reason);
                    total_skipped += 1;
                }
                Ok(PatchResult::Failed { file, reason }) => {
                    eprintln!("{} {}: Failed - {}", "✗".red(), patch_id, reason);
                    eprintln!("  File: {}", file.display());
                    total_failed += 1;
                }
                Err(e) => {
                    eprintln!("{} {}: Error - {}", "✗".red(), patch_id, e);
                    total_failed += 1;

                    // Provide helpful conflict diagnostics
                    match &e {
                        ApplicationError::AnchorNotFound { file, .. } => {
                            eprintln!("  {}", "CONFLICT: Anchor matched no locations".red());
                            eprintln!("  File: {}", file.display());
                            eprintln!("  Possible causes:");
                            eprintln!("    - Anchor text was renamed or removed upstream");
                            eprintln!("    - Code was moved to a different file");
                            eprintln!("    - An earlier edit already rewrote this location");
                        }
                        ApplicationError::AmbiguousAnchor { file, count, .. } => {
                            eprintln!(
                                "  {}",
                                format!(
                                    "CONFLICT: Anchor matched {} locations (expected 1)",
                                    count
                                )
                                .red()
                            );
                            eprintln!("  File: {}", file.display());
                            eprintln!("  Action: Extend the anchor text to be more specific");
                        }
                        ApplicationError::Edit { source, .. } => {
                            eprintln!("  Edit error: {}", source);
                        }
                        _ => {}
                    }
                }
            }
        }

        println!();
    }

    // 6. Summary
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!(
        "  {} already applied",
        format!("{}", total_already_applied).yellow()
    );
    println!("  {} skipped", format!("{}", total_skipped).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(workspace: Option<PathBuf>) -> Result<()> {
    // 1. Resolve workspace path
    let workspace = resolve_workspace(workspace)?;

    // 2. Discover patch files
    let patch_files = discover_patch_files(&workspace)?;

    // 3. Determine workspace version
    let workspace_version = workspace_version_or_default(&workspace);

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!("Version: {}", workspace_version);
    println!();

    let mut applied = Vec::new();
    let mut not_applied = Vec::new();
    let mut skipped = Vec::new();

    // 4. Check status of all patches (read-only; does not mutate workspace files)
    for patch_file in patch_files {
        let config = load_from_path(&patch_file)?;
        let results = check_patches(&config, &workspace, &workspace_version);

        for (patch_id, result) in results {
            match result {
                Ok(PatchResult::Applied { .. }) => {
                    // Anchor resolves and the edit would land if applied.
                    not_applied.push((patch_id, "anchor found but not yet applied".to_string()));
                }
                Ok(PatchResult::AlreadyApplied { .. }) => {
                    applied.push(patch_id);
                }
                Ok(PatchResult::SkippedVersion { reason }) => {
                    skipped.push((patch_id, reason));
                }
                Ok(PatchResult::Failed { ref reason, .. }) => {
                    not_applied.push((patch_id, reason.clone()));
                }
                Err(ref e) => {
                    not_applied.push((patch_id, e.to_string()));
                }
            }
        }
    }

    // 5. Report grouped by status
    if !applied.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !not_applied.is_empty() {
        println!(
            "{} {} ({} patches)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            not_applied.len()
        );
        for (id, reason) in &not_applied {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !skipped.is_empty() {
        println!(
            "{} {} ({} patches)",
            "⊘".cyan(),
            "SKIPPED".cyan().bold(),
            skipped.len()
        );
        for (id, reason) in &skipped {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_verify(workspace: Option<PathBuf>) -> Result<()> {
    // 1. Resolve workspace path
    let workspace = resolve_workspace(workspace)?;

    // 2. Discover patch files
    let patch_files = discover_patch_files(&workspace)?;

    // 3. Determine workspace version
    let workspace_version = workspace_version_or_default(&workspace);

    println!("{}", "Verifying patches...".bold());
    println!("Workspace: {}", workspace.display());
    println!("Version: {}", workspace_version);
    println!();

    let mut verified = 0;
    let mut mismatch = 0;
    let mut skipped = 0;

    // 4. Check verification for all patches
    for patch_file in patch_files {
        let config = load_from_path(&patch_file)?;
        let results = check_patches(&config, &workspace, &workspace_version);

        for (patch_id, result) in results {
            match result {
                Ok(PatchResult::AlreadyApplied { .. }) => {
                    println!("{} {}: Verified (already applied)", "✓".green(), patch_id);
                    verified += 1;
                }
                Ok(PatchResult::Applied { file }) => {
                    // This means it wasn't already applied, so verification failed
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Expected: patch already applied");
                    eprintln!("  Found: patch not yet applied");
                    eprintln!("  Location: {}", file.display());
                    mismatch += 1;
                }
                Ok(PatchResult::SkippedVersion { reason }) => {
                    println!("{} {}: Skipped ({})", "⊘".cyan(), patch_id, reason);
                    skipped += 1;
                }
                Ok(PatchResult::Failed {
                    ref file,
                    ref reason,
                }) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Error: {}", reason);
                    eprintln!("  Location: {}", file.display());
                    mismatch += 1;
                }
                Err(ref e) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Error: {}", e);
                    mismatch += 1;
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{}", verified).green());
    println!("  {} mismatch", format!("{}", mismatch).red());
    println!("  {} skipped", format!("{}", skipped).cyan());

    if mismatch > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let patch_files = discover_patch_files(&workspace)?;

    for patch_file in patch_files {
        let config = load_from_path(&patch_file)?;

        println!("{}", patch_file.display().to_string().bold());
        println!("  Name: {}", config.meta.name);
        if let Some(description) = &config.meta.description {
            println!("  Description: {}", description);
        }
        match &config.meta.version_range {
            Some(range) => println!("  Version range: {}", range),
            None => println!("  Version range: {}", "any".dimmed()),
        }
        println!("  Patches: {}", config.patches.len());
        for patch in &config.patches {
            println!("    - {} ({})", patch.id, patch.file.dimmed());
            println!("      {}", patch.locator.to_locator().describe().dimmed());
        }
        println!();
    }

    Ok(())
}
