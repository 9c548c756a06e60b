//! CPU architecture types and Mach-O fat header constants.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::Error;

/// 64-bit ABI flag OR'd into a Mach-O `cputype`.
const CPU_ARCH_ABI64: u32 = 0x0100_0000;
const CPU_TYPE_X86: u32 = 7;
const CPU_TYPE_ARM: u32 = 12;

/// Capability bits carried in the high byte of `cpusubtype`.
const CPU_SUBTYPE_MASK: u32 = 0xff00_0000;

/// CPU architecture a universal binary slice can target.
///
/// Represents the architectures the Mach-O fat format knows how to index.
/// Parsing accepts the short name (`x86_64`, `arm64`), common aliases
/// (`aarch64`, `x86`) and Rust target triples (`aarch64-apple-darwin`).
///
/// # Examples
///
/// ```
/// use kodegen_bundler_universal::bundler::Arch;
///
/// let arch: Arch = "aarch64-apple-darwin".parse().unwrap();
/// assert_eq!(arch, Arch::Arm64);
/// assert_eq!(arch.target_triple(), "aarch64-apple-darwin");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// x86_64 (64-bit Intel)
    X86_64,
    /// arm64 / AArch64 (Apple Silicon)
    Arm64,
    /// arm64e (pointer-authenticated Apple Silicon ABI)
    Arm64e,
    /// i386 (32-bit Intel, legacy)
    I386,
}

impl Arch {
    /// Every architecture the merge format recognizes.
    pub const ALL: [Arch; 4] = [Arch::X86_64, Arch::Arm64, Arch::Arm64e, Arch::I386];

    /// Returns the short name used by `lipo` and in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
            Arch::Arm64e => "arm64e",
            Arch::I386 => "i386",
        }
    }

    /// Returns the default Rust target triple for this architecture.
    pub fn target_triple(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64-apple-darwin",
            Arch::Arm64 => "aarch64-apple-darwin",
            Arch::Arm64e => "arm64e-apple-darwin",
            Arch::I386 => "i686-apple-darwin",
        }
    }

    /// Mach-O `cputype` for the fat header.
    pub fn cpu_type(&self) -> u32 {
        match self {
            Arch::X86_64 => CPU_TYPE_X86 | CPU_ARCH_ABI64,
            Arch::Arm64 | Arch::Arm64e => CPU_TYPE_ARM | CPU_ARCH_ABI64,
            Arch::I386 => CPU_TYPE_X86,
        }
    }

    /// Mach-O `cpusubtype` for the fat header.
    pub fn cpu_subtype(&self) -> u32 {
        match self {
            // CPU_SUBTYPE_X86_64_ALL / CPU_SUBTYPE_I386_ALL
            Arch::X86_64 | Arch::I386 => 3,
            // CPU_SUBTYPE_ARM64_ALL
            Arch::Arm64 => 0,
            // CPU_SUBTYPE_ARM64E
            Arch::Arm64e => 2,
        }
    }

    /// Slice alignment as a power of two.
    ///
    /// Apple Silicon pages are 16 KiB, Intel pages 4 KiB.
    pub fn align(&self) -> u32 {
        match self {
            Arch::Arm64 | Arch::Arm64e => 14,
            Arch::X86_64 | Arch::I386 => 12,
        }
    }

    /// Maps a fat header entry back to an architecture.
    ///
    /// Capability bits in the subtype's high byte are ignored.
    pub fn from_cpu(cpu_type: u32, cpu_subtype: u32) -> Option<Arch> {
        let subtype = cpu_subtype & !CPU_SUBTYPE_MASK;
        Arch::ALL
            .into_iter()
            .find(|arch| arch.cpu_type() == cpu_type && arch.cpu_subtype() == subtype)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace("x86-64", "x86_64");
        // Triples carry the architecture as their first component
        let head = normalized.split('-').next().unwrap_or_default();

        match head {
            "x86_64" | "amd64" => Ok(Arch::X86_64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "arm64e" => Ok(Arch::Arm64e),
            "i386" | "i686" | "x86" => Ok(Arch::I386),
            _ => Err(Error::UnsupportedArchitecture(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_aliases_and_triples() {
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("arm64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("ARM64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("x86_64-apple-darwin".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("aarch64-apple-darwin".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("arm64e-apple-darwin".parse::<Arch>().unwrap(), Arch::Arm64e);
        assert_eq!("i686-apple-darwin".parse::<Arch>().unwrap(), Arch::I386);
    }

    #[test]
    fn test_parse_unsupported() {
        let err = "powerpc".parse::<Arch>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedArchitecture(ref name) if name == "powerpc"));
        assert!("riscv64gc-unknown-linux-gnu".parse::<Arch>().is_err());
        assert!("".parse::<Arch>().is_err());
    }

    #[test]
    fn test_cpu_constants() {
        assert_eq!(Arch::X86_64.cpu_type(), 0x0100_0007);
        assert_eq!(Arch::Arm64.cpu_type(), 0x0100_000C);
        assert_eq!(Arch::I386.cpu_type(), 7);
        assert_eq!(Arch::Arm64.align(), 14);
        assert_eq!(Arch::X86_64.align(), 12);
    }

    #[test]
    fn test_from_cpu_round_trips_every_arch() {
        for arch in Arch::ALL {
            assert_eq!(Arch::from_cpu(arch.cpu_type(), arch.cpu_subtype()), Some(arch));
        }
        // arm64e slices commonly set the pointer-auth ABI capability bit
        assert_eq!(Arch::from_cpu(0x0100_000C, 0x8000_0002), Some(Arch::Arm64e));
        assert_eq!(Arch::from_cpu(18, 0), None);
    }
}
