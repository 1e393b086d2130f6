use super::remote::Transport;
use super::ListEntry;
use crate::Result;
use ftp_store::FtpStore;

impl Transport for FtpStore {
    fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
        let entries = FtpStore::list(self, dir)?;
        Ok(entries
            .into_iter()
            .map(|e| ListEntry {
                name: e.name,
                is_dir: e.is_dir,
                is_regular: e.is_regular,
            })
            .collect())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(FtpStore::read(self, path)?)
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        Ok(FtpStore::write(self, path, data)?)
    }

    fn delete(&self, path: &str) -> Result<()> {
        Ok(FtpStore::delete(self, path)?)
    }

    fn remove_dir_all(&self, path: &str) -> Result<()> {
        Ok(FtpStore::remove_dir_all(self, path)?)
    }

    // The mode is applied by the follow-up change_mode.
    fn make_dir(&self, path: &str, _mode: u32) -> Result<()> {
        Ok(FtpStore::make_dir(self, path)?)
    }

    fn change_mode(&self, path: &str, mode: u32) -> Result<()> {
        Ok(FtpStore::chmod(self, path, mode)?)
    }
}
