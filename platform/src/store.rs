//! The file backed lease store.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use super::{Family, LeaseStore, StoredLease};

/// Persists lease blobs as one file per interface and family.
///
/// Files are written to a staging name first and renamed into place, so
/// a crash never leaves a half written lease behind.
pub struct FileLeaseStore {
    directory: PathBuf,
}

impl FileLeaseStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_owned(),
        }
    }

    fn path(&self, interface: &str, family: Family) -> PathBuf {
        self.directory.join(format!("{}-{}.lease", interface, family))
    }
}

impl LeaseStore for FileLeaseStore {
    fn read(&self, interface: &str, family: Family) -> io::Result<Option<StoredLease>> {
        let path = self.path(interface, family);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(ref error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error),
        };
        let written = fs::metadata(&path)?.modified()?;
        debug!("read {} octets from {}", data.len(), path.display());
        Ok(Some(StoredLease { data, written }))
    }

    fn write(&mut self, interface: &str, family: Family, data: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path(interface, family);
        let staging = path.with_extension("lease.new");
        fs::write(&staging, data)?;
        fs::rename(&staging, &path)?;
        debug!("wrote {} octets to {}", data.len(), path.display());
        Ok(())
    }

    fn remove(&mut self, interface: &str, family: Family) -> io::Result<()> {
        let path = self.path(interface, family);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(ref error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("dhcp-lease-store-{}", std::process::id()))
    }

    #[test]
    fn a_lease_survives_a_round_trip() {
        let mut store = FileLeaseStore::new(scratch());

        store.write("test0", Family::Ipv4, b"lease contents").unwrap();
        let stored = store.read("test0", Family::Ipv4).unwrap().unwrap();
        assert_eq!(stored.data, b"lease contents");

        store.remove("test0", Family::Ipv4).unwrap();
        assert_eq!(store.read("test0", Family::Ipv4).unwrap(), None);
    }

    #[test]
    fn families_are_stored_separately() {
        let mut store = FileLeaseStore::new(scratch());

        store.write("test1", Family::Ipv4, b"four").unwrap();
        store.write("test1", Family::Ipv6, b"six").unwrap();

        assert_eq!(
            store.read("test1", Family::Ipv4).unwrap().unwrap().data,
            b"four"
        );
        assert_eq!(
            store.read("test1", Family::Ipv6).unwrap().unwrap().data,
            b"six"
        );

        store.remove("test1", Family::Ipv4).unwrap();
        store.remove("test1", Family::Ipv6).unwrap();
    }

    #[test]
    fn a_missing_lease_reads_as_none() {
        let store = FileLeaseStore::new(scratch());

        assert_eq!(store.read("missing0", Family::Ipv4).unwrap(), None);
    }
}
