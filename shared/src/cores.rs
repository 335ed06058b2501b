//! Known emulator cores.
//!
//! Cores sort their save files and states into directories named after
//! their display name ("FCEUmm", "Snes9x", ...), so the host has to know that
//! name to find the files a core produces.

/// A core the host knows how to locate output files for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownCore {
    /// Short id, as used in core file names (`fceumm_libretro.wasm`).
    pub name: &'static str,
    /// Display name, as used in save and state directory names.
    pub full_name: &'static str,
}

const fn core(name: &'static str, full_name: &'static str) -> KnownCore {
    KnownCore { name, full_name }
}

pub const KNOWN_CORES: &[KnownCore] = &[
    core("a5200", "a5200"),
    core("bluemsx", "blueMSX"),
    core("fbneo", "FinalBurn Neo"),
    core("fceumm", "FCEUmm"),
    core("gambatte", "Gambatte"),
    core("gearcoleco", "Gearcoleco"),
    core("genesis_plus_gx", "Genesis Plus GX"),
    core("handy", "Handy"),
    core("mame2003", "MAME 2003 (0.78)"),
    core("mame2003_plus", "MAME 2003-Plus"),
    core("mednafen_lynx", "Beetle Lynx"),
    core("mednafen_ngp", "Beetle NeoPop"),
    core("mednafen_pce_fast", "Beetle PCE Fast"),
    core("mednafen_vb", "Beetle VB"),
    core("mednafen_wswan", "Beetle WonderSwan"),
    core("mgba", "mGBA"),
    core("nestopia", "Nestopia"),
    core("picodrive", "PicoDrive"),
    core("prosystem", "ProSystem"),
    core("quicknes", "QuickNES"),
    core("snes9x", "Snes9x"),
    core("stella2014", "Stella 2014"),
    core("vba_next", "VBA Next"),
];

/// Look up a known core by its short id.
pub fn find_core(name: &str) -> Option<&'static KnownCore> {
    KNOWN_CORES.iter().find(|core| core.name == name)
}

/// Display name of a core, if known.
pub fn core_full_name(name: &str) -> Option<&'static str> {
    find_core(name).map(|core| core.full_name)
}
