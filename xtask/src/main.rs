//! Development tasks for hotprompt
//!
//! Usage:
//!   cargo xtask install [--service]  Install binary and man pages under /usr/local (requires sudo)
//!   cargo xtask uninstall            Remove installed files and the user service
//!   cargo xtask dist                 Build a release tarball in target/dist

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

const BIN_DEST: &str = "/usr/local/bin/hotprompt";
const MAN_DEST: &str = "/usr/local/share/man/man1";

const SERVICE_UNIT: &str = "[Unit]
Description=hotprompt global hotkey AI assistant
PartOf=graphical-session.target
After=graphical-session.target

[Service]
ExecStart=/usr/local/bin/hotprompt daemon
Restart=on-failure
RestartSec=5

[Install]
WantedBy=graphical-session.target
";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }

    let service = args.iter().any(|a| a == "--service");

    let result = match args[0].as_str() {
        "install" => install(service),
        "uninstall" => uninstall(),
        "dist" => dist(),
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_help();
            Err(anyhow::anyhow!("Unknown command"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        r#"
hotprompt development tasks

Usage: cargo xtask <COMMAND> [OPTIONS]

Commands:
  install    Build release binary, install it and its man pages (requires sudo)
  uninstall  Remove the installed binary, man pages and user service
  dist       Build a release tarball with the binary and man pages

Options:
  --service  With install: also set up a systemd user service (Linux)

Examples:
  cargo xtask install             # Build and install
  cargo xtask install --service   # ... and start hotprompt with the session
  cargo xtask dist                # target/dist/hotprompt-<version>-<target>.tar.gz
"#
    );
}

/// Get the project root directory
fn project_root() -> PathBuf {
    let dir = env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .or_else(|_| env::current_dir())
        .unwrap_or_else(|_| PathBuf::from("."));

    // xtask is in a subdirectory, go up one level
    dir.parent().unwrap_or(&dir).to_path_buf()
}

/// Build the release binary with man page generation enabled
fn build_release(root: &Path) -> anyhow::Result<PathBuf> {
    println!("==> Building release binary...");

    let status = Command::new("cargo")
        .args(["build", "--release"])
        .env("HOTPROMPT_GEN_MANPAGES", "1")
        .current_dir(root)
        .status()?;

    if !status.success() {
        anyhow::bail!("Build failed");
    }

    let binary = root.join("target/release/hotprompt");
    if !binary.exists() {
        anyhow::bail!("Binary not found at {:?}", binary);
    }
    Ok(binary)
}

/// Man pages written by build.rs into the most recent build output dir
fn find_man_pages(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let build_dir = root.join("target/release/build");
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(&build_dir)? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with("hotprompt-") {
            continue;
        }
        let man_dir = entry.path().join("out/man");
        if !man_dir.is_dir() {
            continue;
        }
        let modified = fs::metadata(&man_dir)?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, man_dir));
        }
    }

    let Some((_, man_dir)) = newest else {
        anyhow::bail!("No generated man pages under {:?}", build_dir);
    };

    let mut pages: Vec<PathBuf> = fs::read_dir(man_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "1"))
        .collect();
    pages.sort();
    Ok(pages)
}

fn sudo(args: &[&str], what: &str) -> anyhow::Result<()> {
    let status = Command::new("sudo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{} failed (sudo required)", what);
    }
    Ok(())
}

/// Build and install to /usr/local
fn install(service: bool) -> anyhow::Result<()> {
    let root = project_root();
    let binary = build_release(&root)?;

    println!("==> Installing to {}...", BIN_DEST);
    sudo(
        &["install", "-Dm755", &binary.to_string_lossy(), BIN_DEST],
        "Install",
    )?;

    match find_man_pages(&root) {
        Ok(pages) => {
            println!("==> Installing {} man pages to {}...", pages.len(), MAN_DEST);
            for page in pages {
                let Some(name) = page.file_name() else { continue };
                let dest = Path::new(MAN_DEST).join(name);
                sudo(
                    &["install", "-Dm644", &page.to_string_lossy(), &dest.to_string_lossy()],
                    "Man page install",
                )?;
            }
        }
        Err(e) => eprintln!("Warning: skipping man pages: {}", e),
    }

    if service {
        install_service()?;
    }

    println!("==> Installed successfully!");
    let _ = Command::new(BIN_DEST).arg("--version").status();

    Ok(())
}

fn service_path() -> anyhow::Result<PathBuf> {
    let home = env::var("HOME").map_err(|_| anyhow::anyhow!("HOME is not set"))?;
    Ok(PathBuf::from(home).join(".config/systemd/user/hotprompt.service"))
}

/// Write and enable a systemd user unit
fn install_service() -> anyhow::Result<()> {
    let path = service_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, SERVICE_UNIT)?;
    println!("==> Wrote {:?}", path);

    let status = Command::new("systemctl")
        .args(["--user", "enable", "--now", "hotprompt.service"])
        .status()?;
    if !status.success() {
        anyhow::bail!("systemctl --user enable failed");
    }
    Ok(())
}

/// Remove everything install put in place
fn uninstall() -> anyhow::Result<()> {
    if let Ok(path) = service_path() {
        if path.exists() {
            println!("==> Disabling user service...");
            let _ = Command::new("systemctl")
                .args(["--user", "disable", "--now", "hotprompt.service"])
                .status();
            fs::remove_file(&path)?;
        }
    }

    println!("==> Removing {} and man pages...", BIN_DEST);
    sudo(&["rm", "-f", BIN_DEST], "Uninstall")?;
    sudo(
        &[
            "sh",
            "-c",
            &format!("rm -f {}/hotprompt.1 {}/hotprompt-*.1", MAN_DEST, MAN_DEST),
        ],
        "Man page removal",
    )?;

    println!("==> Uninstalled successfully!");
    Ok(())
}

/// Build a tarball with the binary, man pages and README
fn dist() -> anyhow::Result<()> {
    let root = project_root();
    let binary = build_release(&root)?;

    let version = Command::new(&binary)
        .arg("--version")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .and_then(|s| s.split_whitespace().nth(1).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    let name = format!("hotprompt-{}-{}-{}", version, env::consts::ARCH, env::consts::OS);

    let stage = root.join("target/dist").join(&name);
    if stage.exists() {
        fs::remove_dir_all(&stage)?;
    }
    fs::create_dir_all(stage.join("man"))?;

    fs::copy(&binary, stage.join("hotprompt"))?;
    for page in find_man_pages(&root)? {
        if let Some(file) = page.file_name() {
            fs::copy(&page, stage.join("man").join(file))?;
        }
    }
    let readme = root.join("README.md");
    if readme.exists() {
        fs::copy(&readme, stage.join("README.md"))?;
    }

    let archive = format!("{}.tar.gz", name);
    let status = Command::new("tar")
        .args(["czf", &archive, &name])
        .current_dir(root.join("target/dist"))
        .status()?;
    if !status.success() {
        anyhow::bail!("tar failed");
    }

    println!("==> Built: {:?}", root.join("target/dist").join(archive));
    Ok(())
}
