use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use flate2::{Crc, Decompress, FlushDecompress, Status};
use log::{debug, warn};

use crate::entry::Entry;
use crate::errors::{CompressionMethod, ZipError};
use crate::structs::central_directory::CentralDirectory;
use crate::structs::eocd::EndOfCentralDirectory;
use crate::structs::local_file_header::LocalFileHeader;

/// Limits and hooks for reading an archive
#[derive(Debug, Clone)]
pub struct ZipOptions {
    /// Refuse to inflate entries that declare more than this many bytes
    pub max_entry_size: u64,

    /// Checked between central directory records and while inflating entries
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for ZipOptions {
    fn default() -> Self {
        ZipOptions {
            max_entry_size: ZipArchive::DEFAULT_MAX_ENTRY_SIZE,
            abort: None,
        }
    }
}

/// Represents a parsed ZIP archive
pub struct ZipArchive {
    input: Vec<u8>,
    entries: Vec<Entry>,
    index: AHashMap<String, usize>,
    comment: Vec<u8>,
    max_entry_size: u64,
    abort: Option<Arc<AtomicBool>>,
}

impl ZipArchive {
    pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

    const LOCAL_HEADER_MAGIC: &[u8] = b"PK\x03\x04";
    const EMPTY_ARCHIVE_MAGIC: &[u8] = b"PK\x05\x06";

    /// Output produced by one decompression step, abort flag is polled between steps
    const INFLATE_STEP: usize = 64 * 1024;

    /// Read archive from disk, the file is closed before this returns
    pub fn open(path: &Path) -> Result<ZipArchive, ZipError> {
        Self::open_with(path, ZipOptions::default())
    }

    pub fn open_with(path: &Path, options: ZipOptions) -> Result<ZipArchive, ZipError> {
        let input = fs::read(path)?;
        Self::with_options(input, options)
    }

    pub fn new(input: Vec<u8>) -> Result<ZipArchive, ZipError> {
        Self::with_options(input, ZipOptions::default())
    }

    pub fn with_options(input: Vec<u8>, options: ZipOptions) -> Result<ZipArchive, ZipError> {
        // perform basic sanity check
        if input.len() < EndOfCentralDirectory::MIN_SIZE {
            return Err(ZipError::NotAZip("file is too small"));
        }

        if !input.starts_with(Self::LOCAL_HEADER_MAGIC)
            && !input.starts_with(Self::EMPTY_ARCHIVE_MAGIC)
        {
            return Err(ZipError::NotAZip("invalid local file header magic"));
        }

        let eocd_offset = EndOfCentralDirectory::find_eocd(&input)
            .ok_or(ZipError::NotAZip("can't find end of central directory"))?;

        let eocd = EndOfCentralDirectory::parse(&mut &input[eocd_offset..])
            .map_err(|_| ZipError::Truncated("invalid end of central directory"))?;

        if eocd.is_zip64() {
            return Err(ZipError::NotAZip("zip64 archives are not supported"));
        }

        if eocd.is_multi_disk() {
            return Err(ZipError::NotAZip("multi-disk archives are not supported"));
        }

        let central_directory = CentralDirectory::parse(&input, &eocd, options.abort.as_deref())?;

        let mut entries = Vec::with_capacity(central_directory.entries.len());
        let mut index = AHashMap::with_capacity(central_directory.entries.len());

        for record in central_directory.entries {
            let entry = Entry::from(record);

            if index.contains_key(&entry.name) {
                // first record wins, the same way the platform installer resolves it
                warn!("duplicate entry in central directory: {:?}", entry.name);
                continue;
            }

            index.insert(entry.name.clone(), entries.len());
            entries.push(entry);
        }

        debug!("parsed zip archive with {} entries", entries.len());

        Ok(ZipArchive {
            input,
            entries,
            index,
            comment: eocd.comment,
            max_entry_size: options.max_entry_size,
            abort: options.abort,
        })
    }

    /// All entries in central directory order
    #[inline]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Get list of the filenames from zip archive
    pub fn namelist(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    #[inline]
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Archive comment from the end of central directory record
    #[inline]
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    #[inline]
    fn check_abort(&self) -> Result<(), ZipError> {
        match &self.abort {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(ZipError::Aborted),
            _ => Ok(()),
        }
    }

    /// Read and decompress a single file from the archive
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ZipError> {
        self.check_abort()?;

        let entry = self
            .entry(name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_owned()))?;

        if entry.uncompressed_size > self.max_entry_size {
            return Err(ZipError::EntryTooLarge {
                name: name.to_owned(),
                size: entry.uncompressed_size,
                limit: self.max_entry_size,
            });
        }

        let local_header = LocalFileHeader::parse(&self.input, entry.offset as usize)
            .map_err(|_| ZipError::Truncated("invalid local file header"))?;

        // central directory is the source of truth, local header may be tampered
        if !entry.has_data_descriptor
            && (local_header.compressed_size as u64 != entry.compressed_size
                || local_header.uncompressed_size as u64 != entry.uncompressed_size)
        {
            debug!("local header sizes differ from central directory for {:?}", name);
        }

        if local_header.compression_method != u16::from(entry.compression_method) {
            warn!(
                "local header compression method {} differs from central directory for {:?}",
                local_header.compression_method, name
            );
        }

        let start = (entry.offset as usize)
            .checked_add(local_header.size())
            .ok_or(ZipError::Truncated("entry offset overflows"))?;
        let end = start
            .checked_add(entry.compressed_size as usize)
            .ok_or(ZipError::Truncated("entry size overflows"))?;

        let compressed_data = self
            .input
            .get(start..end)
            .ok_or(ZipError::Truncated("entry data is out of bounds"))?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => {
                if entry.compressed_size != entry.uncompressed_size {
                    return Err(ZipError::CorruptData {
                        name: name.to_owned(),
                        reason: "stored entry has different compressed and uncompressed sizes",
                    });
                }

                compressed_data.to_vec()
            }
            CompressionMethod::Deflated => {
                self.inflate(name, compressed_data, entry.uncompressed_size as usize)?
            }
            CompressionMethod::Unsupported(method) => {
                return Err(ZipError::UnsupportedCompression {
                    name: name.to_owned(),
                    method,
                });
            }
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(ZipError::CorruptData {
                name: name.to_owned(),
                reason: "crc32 mismatch",
            });
        }

        Ok(data)
    }

    /// Inflate raw deflate stream, output never grows past `uncompressed_size`
    fn inflate(
        &self,
        name: &str,
        compressed_data: &[u8],
        uncompressed_size: usize,
    ) -> Result<Vec<u8>, ZipError> {
        if uncompressed_size == 0 {
            return Ok(Vec::new());
        }

        let corrupt = |reason| ZipError::CorruptData {
            name: name.to_owned(),
            reason,
        };

        let mut decompress = Decompress::new(false);
        let mut uncompressed_data = Vec::with_capacity(uncompressed_size);
        let mut window = vec![0u8; Self::INFLATE_STEP.min(uncompressed_size)];

        loop {
            self.check_abort()?;

            let consumed = decompress.total_in() as usize;
            let input = compressed_data.get(consumed..).unwrap_or_default();
            let before = decompress.total_out();

            let status = decompress
                .decompress(input, &mut window, FlushDecompress::None)
                .map_err(|_| corrupt("invalid deflate stream"))?;

            let produced = (decompress.total_out() - before) as usize;
            if uncompressed_data.len() + produced > uncompressed_size {
                return Err(corrupt("decompressed size doesn't match central directory"));
            }
            uncompressed_data.extend_from_slice(&window[..produced]);

            if status == Status::StreamEnd {
                break;
            }

            // no input left to consume and nothing produced
            if produced == 0 && decompress.total_in() as usize == consumed {
                return Err(corrupt("truncated deflate stream"));
            }
        }

        if uncompressed_data.len() != uncompressed_size {
            return Err(corrupt("decompressed size doesn't match central directory"));
        }

        Ok(uncompressed_data)
    }
}

impl From<CompressionMethod> for u16 {
    fn from(value: CompressionMethod) -> Self {
        match value {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Unsupported(method) => method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ZipBuilder;

    #[test]
    fn read_stored_and_deflated() {
        let input = ZipBuilder::new()
            .stored("AndroidManifest.xml", b"manifest bytes")
            .deflated("resources.arsc", &[0x02u8; 4096])
            .finish();

        let zip = ZipArchive::new(input).unwrap();

        assert_eq!(
            zip.namelist().collect::<Vec<_>>(),
            vec!["AndroidManifest.xml", "resources.arsc"]
        );
        assert_eq!(zip.read("AndroidManifest.xml").unwrap(), b"manifest bytes");
        assert_eq!(zip.read("resources.arsc").unwrap(), vec![0x02u8; 4096]);

        let entry = zip.entry("resources.arsc").unwrap();
        assert_eq!(entry.compression_method, CompressionMethod::Deflated);
        assert_eq!(entry.uncompressed_size, 4096);
        assert!(entry.compressed_size < 4096);
    }

    #[test]
    fn empty_deflated_entry() {
        let input = ZipBuilder::new().deflated("empty", b"").finish();
        let zip = ZipArchive::new(input).unwrap();

        assert!(zip.read("empty").unwrap().is_empty());
    }

    #[test]
    fn missing_entry() {
        let zip = ZipArchive::new(ZipBuilder::new().stored("a", b"a").finish()).unwrap();

        assert!(matches!(
            zip.read("classes.dex"),
            Err(ZipError::EntryNotFound(name)) if name == "classes.dex"
        ));
    }

    #[test]
    fn not_a_zip() {
        assert!(matches!(
            ZipArchive::new(b"definitely not an archive, just some text".to_vec()),
            Err(ZipError::NotAZip(_))
        ));
        assert!(matches!(
            ZipArchive::new(b"PK\x03\x04".to_vec()),
            Err(ZipError::NotAZip(_))
        ));
    }

    #[test]
    fn truncated_archive() {
        let input = ZipBuilder::new()
            .stored("AndroidManifest.xml", &[0x41u8; 256])
            .finish();

        // cut the end of central directory in half
        let truncated = input[..input.len() - 10].to_vec();
        assert!(ZipArchive::new(truncated).is_err());

        // drop the whole central directory but keep a valid looking head
        let head = input[..200].to_vec();
        assert!(matches!(
            ZipArchive::new(head),
            Err(ZipError::NotAZip(_)) | Err(ZipError::Truncated(_))
        ));
    }

    #[test]
    fn empty_archive() {
        let zip = ZipArchive::new(ZipBuilder::new().finish()).unwrap();

        assert!(zip.entries().is_empty());
    }

    #[test]
    fn archive_comment() {
        let input = ZipBuilder::new()
            .stored("a", b"a")
            .comment(b"signed by nobody")
            .finish();
        let zip = ZipArchive::new(input).unwrap();

        assert_eq!(zip.comment(), b"signed by nobody");
        assert!(zip.contains("a"));
        assert!(!zip.entry("a").unwrap().is_dir());
    }

    #[test]
    fn crc_mismatch_is_corrupt_data() {
        let input = ZipBuilder::new()
            .raw_entry("data.bin", 0, b"hello", 5, 0xdeadbeef)
            .finish();
        let zip = ZipArchive::new(input).unwrap();

        assert!(matches!(
            zip.read("data.bin"),
            Err(ZipError::CorruptData { .. })
        ));
    }

    #[test]
    fn broken_deflate_stream() {
        let input = ZipBuilder::new()
            .raw_entry("data.bin", 8, &[0xff, 0xff, 0xff, 0xff], 100, 0)
            .finish();
        let zip = ZipArchive::new(input).unwrap();

        assert!(matches!(
            zip.read("data.bin"),
            Err(ZipError::CorruptData { .. })
        ));
    }

    #[test]
    fn unsupported_compression() {
        let input = ZipBuilder::new()
            .raw_entry("data.bin", 12, b"BZh9", 4, 0)
            .finish();
        let zip = ZipArchive::new(input).unwrap();

        assert!(matches!(
            zip.read("data.bin"),
            Err(ZipError::UnsupportedCompression { method: 12, .. })
        ));
    }

    #[test]
    fn entry_size_limit() {
        let input = ZipBuilder::new().deflated("big", &[0u8; 10_000]).finish();
        let zip = ZipArchive::with_options(
            input,
            ZipOptions {
                max_entry_size: 1024,
                abort: None,
            },
        )
        .unwrap();

        assert!(matches!(
            zip.read("big"),
            Err(ZipError::EntryTooLarge { size: 10_000, limit: 1024, .. })
        ));
    }

    #[test]
    fn duplicate_names_keep_first() {
        let input = ZipBuilder::new()
            .stored("AndroidManifest.xml", b"first")
            .stored("AndroidManifest.xml", b"second")
            .finish();
        let zip = ZipArchive::new(input).unwrap();

        assert_eq!(zip.entries().len(), 1);
        assert_eq!(zip.read("AndroidManifest.xml").unwrap(), b"first");
    }

    #[test]
    fn aborted_before_central_directory() {
        let input = ZipBuilder::new().stored("a", b"a").finish();
        let abort = Arc::new(AtomicBool::new(false));
        abort.store(true, Ordering::Relaxed);

        let result = ZipArchive::with_options(
            input,
            ZipOptions {
                abort: Some(abort),
                ..ZipOptions::default()
            },
        );

        assert!(matches!(result, Err(ZipError::Aborted)));
    }

    #[test]
    fn inflate_spans_several_steps() {
        let data = (0..300_000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let input = ZipBuilder::new().deflated("classes.dex", &data).finish();
        let zip = ZipArchive::new(input).unwrap();

        assert_eq!(zip.read("classes.dex").unwrap(), data);
    }

    #[test]
    fn aborted_while_reading() {
        let input = ZipBuilder::new()
            .stored("AndroidManifest.xml", b"manifest bytes")
            .deflated("resources.arsc", &[0x02u8; 200_000])
            .finish();
        let abort = Arc::new(AtomicBool::new(false));

        let zip = ZipArchive::with_options(
            input,
            ZipOptions {
                abort: Some(abort.clone()),
                ..ZipOptions::default()
            },
        )
        .unwrap();
        assert_eq!(zip.read("AndroidManifest.xml").unwrap(), b"manifest bytes");

        abort.store(true, Ordering::Relaxed);

        assert!(matches!(zip.read("AndroidManifest.xml"), Err(ZipError::Aborted)));
        assert!(matches!(zip.read("resources.arsc"), Err(ZipError::Aborted)));
    }
}
