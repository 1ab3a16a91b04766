//! Display resolution detection
//!
//! The receiver is told the panel size up front so it can scale the mirrored
//! stream. Probes run in order and the first answer wins:
//! framebuffer size, `kmsprint`, DRM connector modes, then 1080p.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::types::Resolution;

const FRAMEBUFFER_SIZE: &str = "/sys/class/graphics/fb0/virtual_size";
const DRM_ROOT: &str = "/sys/class/drm";
const KMSPRINT_TIMEOUT: Duration = Duration::from_secs(5);

/// Detect the attached display's resolution, falling back to 1920x1080
pub async fn detect_resolution() -> Resolution {
    if let Some(resolution) = read_framebuffer(Path::new(FRAMEBUFFER_SIZE)).await {
        tracing::info!("Detected framebuffer resolution {}", resolution);
        return resolution;
    }

    if let Some(resolution) = run_kmsprint().await {
        tracing::info!("Detected display resolution {} via kmsprint", resolution);
        return resolution;
    }

    if let Some(resolution) = read_drm_modes(Path::new(DRM_ROOT)).await {
        tracing::info!("Detected display resolution {} from DRM", resolution);
        return resolution;
    }

    tracing::warn!(
        "Could not detect display resolution, using {}",
        Resolution::FULL_HD
    );
    Resolution::FULL_HD
}

/// Parse `virtual_size` contents: `1920,1080`
#[must_use]
pub fn parse_virtual_size(contents: &str) -> Option<Resolution> {
    let (w, h) = contents.trim().split_once(',')?;
    nonzero(w.trim().parse().ok()?, h.trim().parse().ok()?)
}

/// Find the active mode in `kmsprint` output
///
/// Looks at the first `Crtc` line carrying a `WxH@rate` mode.
#[must_use]
pub fn parse_kmsprint(output: &str) -> Option<Resolution> {
    output
        .lines()
        .filter(|line| line.contains("Crtc"))
        .find_map(|line| line.split_whitespace().find_map(parse_mode_token))
}

/// Parse the first line of a DRM connector's `modes` file: `1920x1080`
#[must_use]
pub fn parse_drm_mode(contents: &str) -> Option<Resolution> {
    let first = contents.lines().next()?.trim();
    let (w, h) = first.split_once('x')?;
    // Interlaced modes carry a trailing "i"
    let h = h.trim_end_matches(|c: char| !c.is_ascii_digit());
    nonzero(w.parse().ok()?, h.parse().ok()?)
}

fn parse_mode_token(token: &str) -> Option<Resolution> {
    let (size, _rate) = token.split_once('@')?;
    let (w, h) = size.split_once('x')?;
    nonzero(w.parse().ok()?, h.parse().ok()?)
}

fn nonzero(width: u32, height: u32) -> Option<Resolution> {
    (width > 0 && height > 0).then(|| Resolution::new(width, height))
}

async fn read_framebuffer(path: &Path) -> Option<Resolution> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    parse_virtual_size(&contents)
}

async fn run_kmsprint() -> Option<Resolution> {
    let output = Command::new("kmsprint").kill_on_drop(true).output();
    match tokio::time::timeout(KMSPRINT_TIMEOUT, output).await {
        Ok(Ok(output)) if output.status.success() => {
            parse_kmsprint(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(Ok(output)) => {
            tracing::debug!("kmsprint exited with {}", output.status);
            None
        }
        Ok(Err(e)) => {
            tracing::debug!("kmsprint unavailable: {}", e);
            None
        }
        Err(_) => {
            tracing::warn!("kmsprint timed out after {:?}", KMSPRINT_TIMEOUT);
            None
        }
    }
}

/// Scan `card*-HDMI-*` connectors for the first connected one with a mode
pub(crate) async fn read_drm_modes(root: &Path) -> Option<Resolution> {
    let mut entries = tokio::fs::read_dir(root).await.ok()?;
    let mut connectors = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("card") && name.contains("-HDMI-") {
            connectors.push(entry.path());
        }
    }
    connectors.sort();

    for connector in connectors {
        let status = tokio::fs::read_to_string(connector.join("status"))
            .await
            .unwrap_or_default();
        if status.trim() != "connected" {
            continue;
        }
        let modes = tokio::fs::read_to_string(connector.join("modes"))
            .await
            .unwrap_or_default();
        if let Some(resolution) = parse_drm_mode(&modes) {
            return Some(resolution);
        }
    }

    None
}
