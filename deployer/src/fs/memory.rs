//! In-memory [`Transport`] for tests, with injectable permission denials and
//! failures and a log of every call.

use super::remote::Transport;
use super::{parent_path, ListEntry};
use crate::utils::DeployError;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Read,
    Write,
    Delete,
    RemoveDir,
    MakeDir,
    Chmod,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    modes: HashMap<String, u32>,
    denied: HashSet<(Op, String)>,
    failing: HashSet<(Op, String)>,
    log: Vec<(Op, String)>,
}

impl State {
    fn parent_exists(&self, path: &str) -> bool {
        match parent_path(path) {
            None | Some("/") => true,
            Some(parent) => self.dirs.contains(parent),
        }
    }

    fn check(&mut self, op: Op, path: &str) -> Result<()> {
        self.log.push((op, path.to_string()));
        let key = (op, path.to_string());
        if self.failing.contains(&key) {
            return Err(DeployError::Transport(format!("connection reset during {:?} {}", op, path)));
        }
        if self.denied.contains(&key) {
            return Err(DeployError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs(dirs: &[&str]) -> Self {
        let transport = Self::new();
        for dir in dirs {
            transport.add_dir(dir);
        }
        transport
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().unwrap().dirs.insert(path.to_string());
    }

    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.state.lock().unwrap().files.insert(path.to_string(), data.to_vec());
    }

    pub fn deny(&self, op: Op, path: &str) {
        self.state.lock().unwrap().denied.insert((op, path.to_string()));
    }

    pub fn fail(&self, op: Op, path: &str) {
        self.state.lock().unwrap().failing.insert((op, path.to_string()));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn mode(&self, path: &str) -> Option<u32> {
        self.state.lock().unwrap().modes.get(path).copied()
    }

    /// Calls made so far, in order.
    pub fn ops(&self) -> Vec<(Op, String)> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.ops().iter().filter(|(o, _)| *o == op).count()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().log.clear();
    }
}

fn child_name<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    let prefix = format!("{}/", dir.trim_end_matches('/'));
    let rest = path.strip_prefix(&prefix)?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

impl Transport for MemoryTransport {
    fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
        let mut state = self.state.lock().unwrap();
        state.check(Op::List, dir)?;
        if dir != "/" && !state.dirs.contains(dir) {
            return Err(DeployError::NotFound(dir.to_string()));
        }

        let dirs = state
            .dirs
            .iter()
            .filter_map(|d| child_name(dir, d))
            .map(ListEntry::dir);
        let files = state
            .files
            .keys()
            .filter_map(|f| child_name(dir, f))
            .map(ListEntry::file);
        Ok(dirs.chain(files).collect())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.check(Op::Read, path)?;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| DeployError::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check(Op::Write, path)?;
        if !state.parent_exists(path) {
            return Err(DeployError::NotFound(path.to_string()));
        }
        if state.dirs.contains(path) {
            return Err(DeployError::Transport(format!("{} is a directory", path)));
        }
        state.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check(Op::Delete, path)?;
        if state.files.remove(path).is_none() {
            return Err(DeployError::NotFound(path.to_string()));
        }
        state.modes.remove(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check(Op::RemoveDir, path)?;

        if state.files.remove(path).is_some() {
            return Ok(());
        }
        if !state.dirs.remove(path) {
            return Err(DeployError::NotFound(path.to_string()));
        }

        let prefix = format!("{}/", path.trim_end_matches('/'));
        state.dirs.retain(|d| !d.starts_with(&prefix));
        state.files.retain(|f, _| !f.starts_with(&prefix));
        state.modes.retain(|m, _| m != path && !m.starts_with(&prefix));
        Ok(())
    }

    fn make_dir(&self, path: &str, _mode: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check(Op::MakeDir, path)?;
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(DeployError::AlreadyExists(path.to_string()));
        }
        if !state.parent_exists(path) {
            return Err(DeployError::NotFound(path.to_string()));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    fn change_mode(&self, path: &str, mode: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check(Op::Chmod, path)?;
        if !state.dirs.contains(path) && !state.files.contains_key(path) {
            return Err(DeployError::NotFound(path.to_string()));
        }
        state.modes.insert(path.to_string(), mode);
        Ok(())
    }
}
