use super::remote::Transport;
use super::ListEntry;
use crate::Result;
use sftp_store::SftpStore;

impl Transport for SftpStore {
    fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
        let entries = SftpStore::list(self, dir)?;
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
        Ok(SftpStore::read(self, path)?)
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        Ok(SftpStore::write(self, path, data)?)
    }

    fn delete(&self, path: &str) -> Result<()> {
        Ok(SftpStore::delete(self, path)?)
    }

    fn remove_dir_all(&self, path: &str) -> Result<()> {
        Ok(SftpStore::remove_dir_all(self, path)?)
    }

    fn make_dir(&self, path: &str, mode: u32) -> Result<()> {
        Ok(SftpStore::make_dir(self, path, mode)?)
    }

    fn change_mode(&self, path: &str, mode: u32) -> Result<()> {
        Ok(SftpStore::chmod(self, path, mode)?)
    }
}
