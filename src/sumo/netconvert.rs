use super::prefixed_path;
use crate::config::NetconvertConfig;
use crate::error::{ConvertError, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed netconvert options: single-node junctions joined within 10 m,
/// full geometry kept, no turnarounds, original names preserved
const NETCONVERT_OPTIONS: &[(&str, &str)] = &[
    ("--junctions.join", "true"),
    ("--junctions.join-dist", "10"),
    ("--junctions.corner-detail", "5"),
    ("--junctions.internal-link-detail", "5"),
    ("--junctions.limit-turn-speed", "5.5"),
    ("--geometry.remove", "false"),
    ("--geometry.min-dist", "0.5"),
    ("--rectangular-lane-cut", "true"),
    ("--no-turnarounds", "true"),
    ("--no-internal-links", "false"),
    ("--check-lane-foes.all", "true"),
    ("--edges.join", "false"),
    ("--output.street-names", "true"),
    ("--output.original-names", "true"),
];

/// Element counts of a compiled `.net.xml`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NetStats {
    pub junctions: usize,
    pub internal_junctions: usize,
    pub edges: usize,
    pub internal_edges: usize,
    pub connections: usize,
}

/// Command-line arguments for compiling `{prefix}.nod.xml`/`.edg.xml`
pub fn netconvert_args(prefix: &Path, with_connections: bool, verbose: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let mut push_file = |flag: &str, suffix: &str| {
        args.push(flag.into());
        args.push(prefixed_path(prefix, suffix).into_os_string());
    };

    push_file("--node-files", ".nod.xml");
    push_file("--edge-files", ".edg.xml");
    push_file("--output-file", ".net.xml");
    if with_connections {
        push_file("--connection-files", ".con.xml");
    }

    for (flag, value) in NETCONVERT_OPTIONS {
        args.push((*flag).into());
        args.push((*value).into());
    }
    if verbose {
        args.push("--verbose".into());
    }
    args
}

/// Compile Plain-XML files into `{prefix}.net.xml`
///
/// # Errors
/// `Netconvert` when the binary cannot be started, exits non-zero, or runs
/// past `timeout_secs` (the process is killed).
pub fn run_netconvert(
    config: &NetconvertConfig,
    prefix: &Path,
    with_connections: bool,
) -> Result<PathBuf> {
    let args = netconvert_args(prefix, with_connections, config.verbose);
    debug!("Running {} {:?}", config.binary.display(), args);

    let mut child = Command::new(&config.binary)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            ConvertError::Netconvert(format!("failed to start {}: {}", config.binary.display(), e))
        })?;

    // A full stderr pipe would stall the child, so drain it on its own thread
    let stderr = child.stderr.take();
    let reader = thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    });

    let status = wait_with_timeout(&mut child, Duration::from_secs(config.timeout_secs))?;
    let stderr_text = reader.join().unwrap_or_default();

    if !status.success() {
        let detail = stderr_text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
        return Err(ConvertError::Netconvert(format!(
            "exited with {}{}{}",
            status,
            if detail.is_empty() { "" } else { ": " },
            detail.trim()
        )));
    }

    if !stderr_text.trim().is_empty() {
        debug!("netconvert stderr:\n{}", stderr_text.trim_end());
    }

    let net_path = prefixed_path(prefix, ".net.xml");
    info!("Compiled {}", net_path.display());
    Ok(net_path)
}

fn wait_with_timeout(child: &mut std::process::Child, timeout: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        let polled = child
            .try_wait()
            .map_err(|e| ConvertError::Netconvert(format!("failed to poll process: {}", e)))?;
        match polled {
            Some(status) => return Ok(status),
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConvertError::Netconvert(format!(
                    "timed out after {} s",
                    timeout.as_secs()
                )));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Count junctions, edges and connections of a compiled network
pub fn read_net_stats(path: &Path) -> Result<NetStats> {
    let text = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
    let doc = roxmltree::Document::parse(&text).map_err(|e| ConvertError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut stats = NetStats::default();
    for node in doc.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "junction" if node.attribute("type") == Some("internal") => {
                stats.internal_junctions += 1
            }
            "junction" => stats.junctions += 1,
            "edge" if node.attribute("id").map_or(false, |id| id.starts_with(':')) => {
                stats.internal_edges += 1
            }
            "edge" => stats.edges += 1,
            "connection" => stats.connections += 1,
            _ => {}
        }
    }

    if stats.edges == 0 {
        warn!("{} contains no regular edges", path.display());
    }
    Ok(stats)
}
