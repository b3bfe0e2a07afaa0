//! The download registry the RPC methods operate on.
//!
//! Downloads are only book-kept here: a download is active while fewer than
//! the configured number of downloads run, otherwise it waits in line. Fetching
//! the data is not this crate's business.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// Download identity, rendered as 16 lower case hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gid(u64);

impl Gid {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid gid: {0}")]
pub struct InvalidGid(String);

impl FromStr for Gid {
    type Err = InvalidGid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidGid(s.to_owned()));
        }
        u64::from_str_radix(s, 16).map(Gid).map_err(|e| InvalidGid(format!("{s} ({e})")))
    }
}

/// Where a download sits in the queue.
///
/// Downloads are never fetched here, so the only way out of the queue is removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Active,
    Waiting,
    Paused,
    Removed,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Paused => "paused",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    gid: Gid,
    uris: Vec<String>,
    options: BTreeMap<String, String>,
    status: DownloadStatus,
    total_length: u64,
    completed_length: u64,
    download_speed: u64,
}

impl Download {
    fn new(gid: Gid, uris: Vec<String>, options: BTreeMap<String, String>, status: DownloadStatus) -> Self {
        Self { gid, uris, options, status, total_length: 0, completed_length: 0, download_speed: 0 }
    }

    pub fn gid(&self) -> Gid {
        self.gid
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn completed_length(&self) -> u64 {
        self.completed_length
    }

    pub fn download_speed(&self) -> u64 {
        self.download_speed
    }
}

/// Aggregate numbers over the whole queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalStat {
    pub download_speed: u64,
    pub upload_speed: u64,
    pub num_active: usize,
    pub num_waiting: usize,
    pub num_stopped: usize,
}

#[derive(Debug)]
pub struct DownloadQueue {
    active: Vec<Download>,
    waiting: VecDeque<Download>,
    stopped: Vec<Download>,
    max_concurrent: usize,
    keep_running: bool,
    next_gid: u64,
}

impl DownloadQueue {
    pub fn new(max_concurrent: usize, keep_running: bool) -> Self {
        Self {
            active: Vec::new(),
            waiting: VecDeque::new(),
            stopped: Vec::new(),
            max_concurrent: max_concurrent.max(1),
            keep_running,
            next_gid: 1,
        }
    }

    /// Queues a new download, starting it right away when a slot is free.
    pub fn add(&mut self, uris: Vec<String>, options: BTreeMap<String, String>) -> Gid {
        let gid = Gid(self.next_gid);
        self.next_gid += 1;

        if self.active.len() < self.max_concurrent {
            debug!(gid = %gid, "download started");
            self.active.push(Download::new(gid, uris, options, DownloadStatus::Active));
        } else {
            debug!(gid = %gid, "download queued");
            self.waiting.push_back(Download::new(gid, uris, options, DownloadStatus::Waiting));
        }
        gid
    }

    /// Stops an active, waiting or paused download.
    ///
    /// Returns `false` when there is no such download or it was already stopped.
    pub fn remove(&mut self, gid: Gid) -> bool {
        let removed = if let Some(index) = self.active.iter().position(|d| d.gid == gid) {
            Some(self.active.remove(index))
        } else if let Some(index) = self.waiting.iter().position(|d| d.gid == gid) {
            self.waiting.remove(index)
        } else {
            None
        };

        let Some(mut download) = removed else {
            return false;
        };
        debug!(gid = %gid, "download removed");
        download.status = DownloadStatus::Removed;
        download.download_speed = 0;
        self.stopped.push(download);
        self.promote();
        true
    }

    /// Holds back an active or waiting download.
    pub fn pause(&mut self, gid: Gid) -> bool {
        if let Some(index) = self.active.iter().position(|d| d.gid == gid) {
            let mut download = self.active.remove(index);
            download.status = DownloadStatus::Paused;
            download.download_speed = 0;
            self.waiting.push_front(download);
            self.promote();
            return true;
        }
        match self.waiting.iter_mut().find(|d| d.gid == gid) {
            Some(download) if download.status == DownloadStatus::Waiting => {
                download.status = DownloadStatus::Paused;
                true
            }
            _ => false,
        }
    }

    /// Lets a paused download compete for a slot again.
    pub fn unpause(&mut self, gid: Gid) -> bool {
        let Some(download) = self.waiting.iter_mut().find(|d| d.gid == gid && d.status == DownloadStatus::Paused) else {
            return false;
        };
        download.status = DownloadStatus::Waiting;
        self.promote();
        true
    }

    fn promote(&mut self) {
        while self.active.len() < self.max_concurrent {
            let Some(index) = self.waiting.iter().position(|d| d.status == DownloadStatus::Waiting) else {
                break;
            };
            let Some(mut download) = self.waiting.remove(index) else {
                break;
            };
            debug!(gid = %download.gid, "download promoted");
            download.status = DownloadStatus::Active;
            self.active.push(download);
        }
    }

    pub fn get(&self, gid: Gid) -> Option<&Download> {
        self.active.iter().chain(self.waiting.iter()).chain(self.stopped.iter()).find(|d| d.gid == gid)
    }

    pub fn active(&self) -> &[Download] {
        &self.active
    }

    /// Waiting and paused downloads, see [`page`] for `offset` and `num`.
    pub fn waiting(&self, offset: i64, num: usize) -> Vec<&Download> {
        page(self.waiting.iter().collect(), offset, num)
    }

    pub fn stopped(&self, offset: i64, num: usize) -> Vec<&Download> {
        page(self.stopped.iter().collect(), offset, num)
    }

    pub fn global_stat(&self) -> GlobalStat {
        GlobalStat {
            download_speed: self.active.iter().map(|d| d.download_speed).sum(),
            upload_speed: 0,
            num_active: self.active.len(),
            num_waiting: self.waiting.len(),
            num_stopped: self.stopped.len(),
        }
    }

    pub fn is_finished(&self) -> bool {
        !self.keep_running && self.active.is_empty() && self.waiting.is_empty()
    }
}

/// Takes up to `num` items starting at `offset`.
///
/// A negative offset counts from the end and walks towards the front, so
/// `-1` starts at the last item.
fn page(items: Vec<&Download>, offset: i64, num: usize) -> Vec<&Download> {
    let len = items.len();
    if offset >= 0 {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
        return items.into_iter().skip(start).take(num).collect();
    }

    let from_end = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
    if from_end > len {
        return Vec::new();
    }
    let start = len - from_end;
    items.into_iter().take(start + 1).rev().take(num).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(queue: &mut DownloadQueue, uri: &str) -> Gid {
        queue.add(vec![uri.to_owned()], BTreeMap::new())
    }

    fn gids(downloads: &[&Download]) -> Vec<Gid> {
        downloads.iter().map(|d| d.gid()).collect()
    }

    #[test]
    fn gid_is_sixteen_hex_digits() {
        let gid = Gid::new(0x2089_b05e_cca3_d829);
        assert_eq!(gid.to_string(), "2089b05ecca3d829");
        assert_eq!("2089b05ecca3d829".parse::<Gid>(), Ok(gid));
        assert!("2089b05ecca3d82".parse::<Gid>().is_err());
        assert!("2089b05ecca3d82z".parse::<Gid>().is_err());
        assert!("+089b05ecca3d829".parse::<Gid>().is_err());
    }

    #[test]
    fn waits_beyond_concurrency_limit() {
        let mut queue = DownloadQueue::new(2, true);
        let first = add(&mut queue, "http://a/1");
        let second = add(&mut queue, "http://a/2");
        let third = add(&mut queue, "http://a/3");

        assert_eq!(queue.active().len(), 2);
        assert_eq!(queue.get(first).unwrap().status(), DownloadStatus::Active);
        assert_eq!(queue.get(second).unwrap().status(), DownloadStatus::Active);
        assert_eq!(queue.get(third).unwrap().status(), DownloadStatus::Waiting);
    }

    #[test]
    fn remove_promotes_waiting() {
        let mut queue = DownloadQueue::new(1, true);
        let first = add(&mut queue, "http://a/1");
        let second = add(&mut queue, "http://a/2");

        assert!(queue.remove(first));
        assert_eq!(queue.get(first).unwrap().status(), DownloadStatus::Removed);
        assert_eq!(queue.get(second).unwrap().status(), DownloadStatus::Active);
        assert_eq!(gids(&queue.stopped(0, 10)), vec![first]);

        assert!(!queue.remove(first));
        assert!(!queue.remove(Gid::new(42)));
    }

    #[test]
    fn pause_frees_slot() {
        let mut queue = DownloadQueue::new(1, true);
        let first = add(&mut queue, "http://a/1");
        let second = add(&mut queue, "http://a/2");

        assert!(queue.pause(first));
        assert_eq!(queue.get(first).unwrap().status(), DownloadStatus::Paused);
        assert_eq!(queue.get(second).unwrap().status(), DownloadStatus::Active);

        assert!(queue.unpause(first));
        assert_eq!(queue.get(first).unwrap().status(), DownloadStatus::Waiting);
        assert!(!queue.unpause(first));
    }

    #[test]
    fn paging_from_both_ends() {
        let mut queue = DownloadQueue::new(1, true);
        add(&mut queue, "http://a/0");
        let waiting: Vec<Gid> = (1..=4).map(|i| add(&mut queue, &format!("http://a/{i}"))).collect();

        assert_eq!(gids(&queue.waiting(0, 2)), waiting[..2]);
        assert_eq!(gids(&queue.waiting(3, 10)), waiting[3..]);
        assert!(queue.waiting(4, 10).is_empty());
        assert_eq!(gids(&queue.waiting(-1, 2)), vec![waiting[3], waiting[2]]);
        assert_eq!(gids(&queue.waiting(-4, 10)), vec![waiting[0]]);
        assert!(queue.waiting(-5, 10).is_empty());
    }

    #[test]
    fn finished_only_without_keep_running() {
        let mut running = DownloadQueue::new(5, true);
        assert!(!running.is_finished());

        let mut batch = DownloadQueue::new(5, false);
        assert!(batch.is_finished());
        let gid = add(&mut batch, "http://a/1");
        assert!(!batch.is_finished());
        batch.remove(gid);
        assert!(batch.is_finished());

        add(&mut running, "http://a/1");
        assert_eq!(running.global_stat().num_active, 1);
    }
}
