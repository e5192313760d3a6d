//! Integration tests for the file download pipeline.
//!
//! A simulated device serves files over a pair of `DeviceLink`s, so every
//! request and response goes through encoding, SLIP framing, chunked
//! delivery and decoding before `FileDownload` sees it.

use devlink_core::protocol::messages::{
    FileDataResponse, FileInfoRequest, FileInfoResponse, FileName,
};
use devlink_core::protocol::{ChecksumKind, InvalidEscapePolicy};
use devlink_core::{FileHash, Packet};
use devlink_host::application::file_transfer::{DownloadPlan, DownloadProgress, FileDownload};
use devlink_host::application::link::{DeviceLink, LinkConfig};
use devlink_host::infrastructure::storage::cache::DeviceFileCache;
use devlink_host::infrastructure::storage::config::HostConfig;
use tempfile::tempdir;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn link_config() -> LinkConfig {
    LinkConfig {
        checksum: ChecksumKind::Crc16CcittFalse,
        invalid_escape: InvalidEscapePolicy::Reject,
    }
}

/// Device side of the conversation: answers file requests from memory.
struct SimulatedDevice {
    link: DeviceLink,
    files: Vec<(String, Vec<u8>)>,
}

impl SimulatedDevice {
    fn new(files: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            link: DeviceLink::new(link_config()),
            files,
        }
    }

    /// Consumes host bytes and returns the device's framed replies.
    fn handle(&mut self, wire: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for result in self.link.receive(wire) {
            let reply = match result.expect("host frames must decode").packet {
                Packet::FileInfoRequest(request) => {
                    let (id, content) = self.lookup(request.name.as_str());
                    Packet::FileInfoResponse(FileInfoResponse {
                        file_id: id,
                        file_length: content.len() as u32,
                        hash: FileHash::compute_bytes(content),
                    })
                }
                Packet::FileDataRequest(request) => {
                    let content = &self.files[request.file_id as usize].1;
                    let start = request.offset as usize;
                    let end = start + request.length as usize;
                    Packet::FileDataResponse(FileDataResponse {
                        file_id: request.file_id,
                        offset: request.offset,
                        data: content[start..end].to_vec(),
                    })
                }
                other => panic!("device does not handle {other:?}"),
            };
            out.extend(self.link.send(&reply).unwrap());
        }
        out
    }

    fn lookup(&self, name: &str) -> (u8, &[u8]) {
        let id = self
            .files
            .iter()
            .position(|(n, _)| n == name)
            .expect("unknown file");
        (id as u8, &self.files[id].1)
    }
}

/// Host sends `packet`; the reply travels back in `piece`-byte reads.
fn exchange(
    host: &mut DeviceLink,
    device: &mut SimulatedDevice,
    packet: &Packet,
    piece: usize,
) -> Packet {
    let reply_wire = device.handle(&host.send(packet).unwrap());
    let mut replies = Vec::new();
    for chunk in reply_wire.chunks(piece) {
        replies.extend(host.receive(chunk));
    }
    assert_eq!(replies.len(), 1, "exactly one reply per request");
    replies.remove(0).unwrap().packet
}

fn ask_info(host: &mut DeviceLink, device: &mut SimulatedDevice, name: &str) -> FileInfoResponse {
    let request = Packet::FileInfoRequest(FileInfoRequest {
        name: FileName::new(name).unwrap(),
    });
    match exchange(host, device, &request, 16) {
        Packet::FileInfoResponse(info) => info,
        other => panic!("expected file info, got {other:?}"),
    }
}

/// Drives a download to completion; returns the request count and final progress.
fn run_download(
    host: &mut DeviceLink,
    device: &mut SimulatedDevice,
    mut download: FileDownload,
    piece: usize,
) -> (usize, DownloadProgress) {
    let mut requests = 0;
    let mut progress = None;
    while let Some(request) = download.next_request() {
        requests += 1;
        let response = match exchange(host, device, &Packet::FileDataRequest(request), piece) {
            Packet::FileDataResponse(response) => response,
            other => panic!("expected file data, got {other:?}"),
        };
        progress = Some(download.apply(&response).unwrap());
    }
    (requests, progress.expect("at least one chunk"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_download_over_link_populates_cache() {
    // Arrange – content full of SLIP special bytes to exercise escaping
    let dir = tempdir().unwrap();
    let cache = DeviceFileCache::new(dir.path());
    let content: Vec<u8> = (0..2000u32)
        .map(|i| [0xC0, 0xDB, 0xDC, i as u8][i as usize % 4])
        .collect();
    let mut device = SimulatedDevice::new(vec![("panel.bin".to_string(), content.clone())]);
    let mut host = DeviceLink::new(link_config());

    // Act
    let info = ask_info(&mut host, &mut device, "panel.bin");
    let link = HostConfig::default().link;
    let plan = FileDownload::start_with_config(&cache, "panel.bin", &info, &link).unwrap();
    let download = match plan {
        DownloadPlan::Download(d) => d,
        DownloadPlan::Cached(_) => panic!("cache starts empty"),
    };
    let (requests, progress) = run_download(&mut host, &mut device, download, 5);

    // Assert
    assert_eq!(requests, 9, "2000 bytes in 245-byte chunks");
    let DownloadProgress::Complete(path) = progress else {
        panic!("download did not complete");
    };
    assert_eq!(std::fs::read(path).unwrap(), content);
}

#[test]
fn test_second_download_is_served_from_cache() {
    // Arrange
    let dir = tempdir().unwrap();
    let cache = DeviceFileCache::new(dir.path());
    let mut device = SimulatedDevice::new(vec![("font.fnt".to_string(), vec![0x42; 300])]);
    let mut host = DeviceLink::new(link_config());
    let info = ask_info(&mut host, &mut device, "font.fnt");
    if let DownloadPlan::Download(d) = FileDownload::start(&cache, "font.fnt", &info, 100).unwrap()
    {
        run_download(&mut host, &mut device, d, 64);
    }

    // Act
    let info = ask_info(&mut host, &mut device, "font.fnt");
    let plan = FileDownload::start(&cache, "font.fnt", &info, 100).unwrap();

    // Assert
    assert!(matches!(plan, DownloadPlan::Cached(_)));
}

#[test]
fn test_changed_device_file_is_downloaded_again() {
    // Arrange – cache holds an older version
    let dir = tempdir().unwrap();
    let cache = DeviceFileCache::new(dir.path());
    let mut old = cache.create_file("cfg.bin").unwrap();
    old.write(b"old", 0, 3).unwrap();
    old.close().unwrap();

    let new_content = b"new content".to_vec();
    let mut device = SimulatedDevice::new(vec![("cfg.bin".to_string(), new_content.clone())]);
    let mut host = DeviceLink::new(link_config());

    // Act
    let info = ask_info(&mut host, &mut device, "cfg.bin");
    let plan = FileDownload::start(&cache, "cfg.bin", &info, 245).unwrap();

    // Assert
    let DownloadPlan::Download(download) = plan else {
        panic!("stale cache entry must not be reused");
    };
    run_download(&mut host, &mut device, download, 245);
    assert_eq!(std::fs::read(cache.file_path("cfg.bin").unwrap()).unwrap(), new_content);
}

#[test]
fn test_many_files_map_to_distinct_ids() {
    let mut device = SimulatedDevice::new(vec![
        ("one".to_string(), vec![1u8; 10]),
        ("two".to_string(), vec![2u8; 20]),
    ]);
    let mut host = DeviceLink::new(link_config());

    let one = ask_info(&mut host, &mut device, "one");
    let two = ask_info(&mut host, &mut device, "two");

    assert_ne!(one.file_id, two.file_id);
    assert_eq!((one.file_length, two.file_length), (10, 20));
}

#[test]
fn test_async_cache_check_agrees_after_download() {
    // Arrange
    let dir = tempdir().unwrap();
    let cache = DeviceFileCache::new(dir.path());
    let content = vec![0x5A; 64];
    let mut device = SimulatedDevice::new(vec![("icon.img".to_string(), content)]);
    let mut host = DeviceLink::new(link_config());
    let info = ask_info(&mut host, &mut device, "icon.img");
    if let DownloadPlan::Download(d) = FileDownload::start(&cache, "icon.img", &info, 32).unwrap() {
        run_download(&mut host, &mut device, d, 8);
    }

    // Act
    let current = tokio_test::block_on(cache.is_file_exists_async(
        "icon.img".to_string(),
        u64::from(info.file_length),
        info.hash,
    ));

    // Assert
    assert!(current);
}
