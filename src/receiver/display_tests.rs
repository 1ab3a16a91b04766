use super::display::*;
use crate::types::Resolution;

#[test]
fn test_parse_virtual_size() {
    assert_eq!(parse_virtual_size("1920,1080\n"), Some(Resolution::FULL_HD));
    assert_eq!(
        parse_virtual_size(" 1280 , 720 "),
        Some(Resolution::new(1280, 720))
    );
    assert_eq!(parse_virtual_size("0,0"), None);
    assert_eq!(parse_virtual_size("1920x1080"), None);
}

#[test]
fn test_parse_kmsprint() {
    let output = "\
Connector 0 (33) HDMI-A-1 (connected)
  Encoder 0 (32) NONE
    Crtc 2 (92) 1920x1600@59.95 148.500 1920/88/44/148/+ 1600/4/5/36/+ 60 (59.95) P|D
      Plane 0 (40) fb-id: 250 (fbs: 1) 0,0 1920x1600 -> 0,0 1920x1600 (XR24 AR24)
";
    assert_eq!(parse_kmsprint(output), Some(Resolution::new(1920, 1600)));
}

#[test]
fn test_parse_kmsprint_without_crtc() {
    let output = "Connector 0 (33) HDMI-A-1 (disconnected)\n  Plane 0 1920x1080@60\n";
    assert_eq!(parse_kmsprint(output), None);
}

#[test]
fn test_parse_drm_mode() {
    assert_eq!(
        parse_drm_mode("3840x2160\n1920x1080\n"),
        Some(Resolution::new(3840, 2160))
    );
    assert_eq!(parse_drm_mode("1920x1080i\n"), Some(Resolution::FULL_HD));
    assert_eq!(parse_drm_mode(""), None);
}

#[tokio::test]
async fn test_read_drm_modes_skips_disconnected() {
    let dir = tempfile::TempDir::new().unwrap();

    let off = dir.path().join("card0-HDMI-A-1");
    std::fs::create_dir(&off).unwrap();
    std::fs::write(off.join("status"), "disconnected\n").unwrap();
    std::fs::write(off.join("modes"), "").unwrap();

    let on = dir.path().join("card0-HDMI-A-2");
    std::fs::create_dir(&on).unwrap();
    std::fs::write(on.join("status"), "connected\n").unwrap();
    std::fs::write(on.join("modes"), "2560x1440\n1920x1080\n").unwrap();

    let other = dir.path().join("card0-DSI-1");
    std::fs::create_dir(&other).unwrap();
    std::fs::write(other.join("status"), "connected\n").unwrap();
    std::fs::write(other.join("modes"), "800x480\n").unwrap();

    assert_eq!(
        read_drm_modes(dir.path()).await,
        Some(Resolution::new(2560, 1440))
    );
}

#[tokio::test]
async fn test_read_drm_modes_missing_root() {
    assert_eq!(
        read_drm_modes(std::path::Path::new("/nonexistent/drm")).await,
        None
    );
}
