//! Universal binary creation for macOS (Intel + Apple Silicon)
//!
//! Merges per-architecture executables into one Mach-O fat binary, the same
//! container `lipo -create` produces. The format is a big-endian index
//! (`0xCAFEBABE`, slice count, then one `{cputype, cpusubtype, offset, size,
//! align}` record per slice) followed by the slices, each starting on its
//! architecture's page boundary. The loader picks the slice matching the CPU
//! it runs on, so table order carries no meaning; it is still fixed
//! (sorted by alignment, then CPU type) so identical inputs give a
//! byte-identical output.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::arch::Arch;
use super::compile::BuildArtifact;
use super::error::{Error, ErrorExt, Result};
use crate::bail;

/// Magic number of a 32-bit fat header.
pub const FAT_MAGIC: u32 = 0xCAFE_BABE;

const FAT_HEADER_SIZE: u64 = 8;
const FAT_ARCH_SIZE: u64 = 20;
const ZEROES: [u8; 4096] = [0; 4096];

/// One entry of the fat header's architecture table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FatSlice {
    /// Architecture of this slice
    pub arch: Arch,
    /// Mach-O CPU type
    pub cpu_type: u32,
    /// Mach-O CPU subtype
    pub cpu_subtype: u32,
    /// Byte offset of the slice in the file
    pub offset: u32,
    /// Slice length in bytes
    pub size: u32,
    /// Alignment as a power of two
    pub align: u32,
}

/// The merged multi-architecture executable.
#[derive(Clone, Debug, Serialize)]
pub struct MergedExecutable {
    /// Where the fat binary was written
    pub path: PathBuf,
    /// Architecture table, in file order
    pub slices: Vec<FatSlice>,
}

impl MergedExecutable {
    /// Architectures contained in the binary, in table order.
    pub fn architectures(&self) -> Vec<Arch> {
        self.slices.iter().map(|s| s.arch).collect()
    }

    /// Whether the loader can find a slice for `arch`.
    pub fn supports(&self, arch: Arch) -> bool {
        self.slices.iter().any(|s| s.arch == arch)
    }
}

/// Computes the architecture table for slices of the given sizes.
///
/// Slices are ordered by `(align, cputype, cpusubtype)` and placed at the
/// first suitably aligned offset after the previous one.
///
/// # Errors
///
/// [`Error::DuplicateArchitecture`] if an architecture appears twice,
/// [`Error::SliceTooLarge`] if an offset or size overflows 32 bits.
pub fn layout(inputs: &[(Arch, u64)]) -> Result<Vec<FatSlice>> {
    let mut seen = HashSet::new();
    for (arch, _) in inputs {
        if !seen.insert(*arch) {
            return Err(Error::DuplicateArchitecture(*arch));
        }
    }

    let mut sorted = inputs.to_vec();
    sorted.sort_by_key(|(arch, _)| (arch.align(), arch.cpu_type(), arch.cpu_subtype()));

    let mut cursor = FAT_HEADER_SIZE + FAT_ARCH_SIZE * sorted.len() as u64;
    let mut slices = Vec::with_capacity(sorted.len());
    for (arch, size) in sorted {
        let offset = align_up(cursor, arch.align());
        let too_large = || Error::SliceTooLarge { arch, size };

        slices.push(FatSlice {
            arch,
            cpu_type: arch.cpu_type(),
            cpu_subtype: arch.cpu_subtype(),
            offset: u32::try_from(offset).map_err(|_| too_large())?,
            size: u32::try_from(size).map_err(|_| too_large())?,
            align: arch.align(),
        });
        cursor = offset + size;
    }

    if u32::try_from(cursor).is_err() {
        let last = slices.last().map(|s| s.arch).unwrap_or(Arch::X86_64);
        return Err(Error::SliceTooLarge {
            arch: last,
            size: cursor,
        });
    }

    Ok(slices)
}

/// Serializes the fat header and architecture table.
pub fn encode_header(slices: &[FatSlice]) -> Vec<u8> {
    let mut header =
        Vec::with_capacity((FAT_HEADER_SIZE + FAT_ARCH_SIZE * slices.len() as u64) as usize);
    header.extend_from_slice(&FAT_MAGIC.to_be_bytes());
    header.extend_from_slice(&(slices.len() as u32).to_be_bytes());
    for slice in slices {
        for field in [
            slice.cpu_type,
            slice.cpu_subtype,
            slice.offset,
            slice.size,
            slice.align,
        ] {
            header.extend_from_slice(&field.to_be_bytes());
        }
    }
    header
}

/// Merges per-architecture executables into one fat binary at `output`.
///
/// Every input is checked for existence before anything is written. The
/// written file is re-read and its architecture table compared against the
/// expected one.
///
/// # Errors
///
/// - [`Error::MissingArtifact`] if any input file is absent
/// - [`Error::DuplicateArchitecture`] if two inputs claim one architecture
/// - [`Error::MergeVerification`] if the written table does not match
pub async fn create_universal_binary(
    artifacts: &[BuildArtifact],
    output: &Path,
) -> Result<MergedExecutable> {
    let mut seen = HashSet::new();
    for artifact in artifacts {
        if !seen.insert(artifact.arch) {
            return Err(Error::DuplicateArchitecture(artifact.arch));
        }
    }

    let mut sized = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let size = match fs::metadata(&artifact.path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(Error::MissingArtifact {
                    arch: artifact.arch,
                    path: artifact.path.clone(),
                });
            }
        };
        sized.push((artifact.arch, size));
    }

    let slices = layout(&sized)?;

    log::info!(
        "Creating universal binary ({}) at {}",
        slices
            .iter()
            .map(|s| s.arch.name())
            .collect::<Vec<_>>()
            .join(" + "),
        output.display()
    );

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .await
            .merge_context("creating output directory", parent)?;
    }

    write_fat_binary(artifacts, &slices, output).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(output, std::fs::Permissions::from_mode(0o755))
            .await
            .merge_context("setting executable permissions on", output)?;
    }

    // Equivalent of `lipo -info`: the loader-visible table must list every input
    let written = read_architectures(output).await?;
    if written != slices {
        return Err(Error::MergeVerification {
            path: output.to_path_buf(),
            reason: format!(
                "expected [{}], found [{}]",
                describe(&slices),
                describe(&written)
            ),
        });
    }

    log::info!("✓ Universal binary: {}", describe(&written));
    Ok(MergedExecutable {
        path: output.to_path_buf(),
        slices,
    })
}

async fn write_fat_binary(
    artifacts: &[BuildArtifact],
    slices: &[FatSlice],
    output: &Path,
) -> Result<()> {
    let file = fs::File::create(output)
        .await
        .merge_context("creating merged executable", output)?;
    let mut writer = BufWriter::new(file);

    let header = encode_header(slices);
    writer
        .write_all(&header)
        .await
        .merge_context("writing fat header to", output)?;
    let mut position = header.len() as u64;

    for slice in slices {
        let Some(artifact) = artifacts.iter().find(|a| a.arch == slice.arch) else {
            bail!("no artifact for {} slice", slice.arch);
        };

        let mut padding = u64::from(slice.offset) - position;
        while padding > 0 {
            let chunk = padding.min(ZEROES.len() as u64) as usize;
            writer
                .write_all(&ZEROES[..chunk])
                .await
                .merge_context("padding slice in", output)?;
            padding -= chunk as u64;
        }

        let mut input = fs::File::open(&artifact.path)
            .await
            .map_err(|_| Error::MissingArtifact {
                arch: artifact.arch,
                path: artifact.path.clone(),
            })?;
        let copied = tokio::io::copy(&mut input, &mut writer)
            .await
            .merge_context("copying slice from", &artifact.path)?;
        if copied != u64::from(slice.size) {
            return Err(Error::MergeVerification {
                path: artifact.path.clone(),
                reason: format!(
                    "{} changed while merging ({} bytes expected, {} copied)",
                    slice.arch, slice.size, copied
                ),
            });
        }
        position = u64::from(slice.offset) + copied;
    }

    writer
        .flush()
        .await
        .merge_context("flushing merged executable", output)?;
    Ok(())
}

/// Reads the architecture table of a fat binary.
///
/// # Errors
///
/// [`Error::MergeVerification`] if the file is a thin (single architecture)
/// Mach-O, [`Error::BinaryParse`] if it is not Mach-O at all, and
/// [`Error::UnsupportedArchitecture`] for CPU types the tool does not know.
pub async fn read_architectures(path: &Path) -> Result<Vec<FatSlice>> {
    use goblin::mach::Mach;

    let bytes = fs::read(path)
        .await
        .merge_context("reading merged executable", path)?;

    match Mach::parse(&bytes)? {
        Mach::Fat(multi) => {
            let mut slices = Vec::new();
            for fat_arch in multi.iter_arches() {
                let fat_arch = fat_arch?;
                let arch = Arch::from_cpu(fat_arch.cputype, fat_arch.cpusubtype).ok_or_else(
                    || {
                        Error::UnsupportedArchitecture(format!(
                            "cputype {:#x} subtype {:#x}",
                            fat_arch.cputype, fat_arch.cpusubtype
                        ))
                    },
                )?;
                slices.push(FatSlice {
                    arch,
                    cpu_type: fat_arch.cputype,
                    cpu_subtype: fat_arch.cpusubtype,
                    offset: fat_arch.offset,
                    size: fat_arch.size,
                    align: fat_arch.align,
                });
            }
            Ok(slices)
        }
        Mach::Binary(_) => Err(Error::MergeVerification {
            path: path.to_path_buf(),
            reason: "file is a single-architecture Mach-O, not a fat binary".into(),
        }),
    }
}

fn align_up(value: u64, align: u32) -> u64 {
    let boundary = 1u64 << align;
    value.div_ceil(boundary) * boundary
}

fn describe(slices: &[FatSlice]) -> String {
    slices
        .iter()
        .map(|s| format!("{}@{:#x}+{}", s.arch, s.offset, s.size))
        .collect::<Vec<_>>()
        .join(", ")
}
