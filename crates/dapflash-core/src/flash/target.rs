//! Target flash programming engine
//!
//! [`TargetFlash`] owns one programming session against one target. It
//! resolves which flash algorithm governs an address, makes sure that
//! algorithm is resident and initialised for the right function, and
//! sequences erase and program calls through a [`FlashAlgo`].
//!
//! Session lifecycle:
//!
//! ```text
//! Closed --init()--> Open --uninit()--> Closed
//! ```
//!
//! Every operation other than `init()` fails with [`Error::Failure`] while
//! the session is closed.

use crate::algo::{FlashAlgo, TargetControl};
use crate::error::{AlgoFailure, AlgoOp, Error, Result};
use crate::settings::Settings;
use crate::target::{AlgoFlags, BoardInfo, FlashFunc, ProgramTarget, TargetFamily, TargetState};

use super::intf::FlashIntf;
use super::resolve::{self, Resolved};

/// Bytes read back per transfer when verifying without a `Verify()` entry
const READBACK_CHUNK: usize = 64;

/// Session state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session
    #[default]
    Closed,
    /// Session open, operations allowed
    Open,
    /// Reserved for unrecoverable sessions
    Error,
}

/// Flash programming engine for one target
pub struct TargetFlash<'a, D> {
    driver: D,
    board: Option<&'a BoardInfo>,
    family: &'a dyn TargetFamily,
    settings: Settings,
    state: SessionState,
    /// Algorithm selected by the last successful `set()`
    current: Option<Resolved>,
    /// First region flagged as default, cached at `init()`
    default_region: Option<usize>,
    /// Algorithm blob resident in target RAM
    loaded_algo: Option<usize>,
    /// Function the resident algorithm is initialised for
    last_func: FlashFunc,
    /// `flash_start` passed to the last `Init()`
    func_start: u32,
}

impl<'a, D: FlashAlgo + TargetControl> TargetFlash<'a, D> {
    /// Create a closed engine
    ///
    /// The family hooks are taken from `board`. Without a board every
    /// operation fails with [`Error::Failure`].
    pub fn new(driver: D, board: Option<&'a BoardInfo>, settings: Settings) -> Self {
        let family: &'a dyn TargetFamily = match board {
            Some(board) => board.family.hooks(),
            None => &crate::target::StubFamily,
        };

        Self {
            driver,
            board,
            family,
            settings,
            state: SessionState::Closed,
            current: None,
            default_region: None,
            loaded_algo: None,
            last_func: FlashFunc::Nop,
            func_start: 0,
        }
    }

    /// Replace the family hooks
    pub fn with_family(mut self, family: &'a dyn TargetFamily) -> Self {
        self.family = family;
        self
    }

    /// Get a reference to the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Consume the engine and return the driver
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Session settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Algorithm selected by the last successful `set()`
    pub fn current_algorithm(&self) -> Option<&'a ProgramTarget> {
        let board = self.board?;
        self.current.map(|c| &board.target.algorithms[c.algo])
    }

    /// Start of the region the current algorithm was selected through
    pub fn flash_start(&self) -> Option<u32> {
        self.current.map(|c| c.flash_start)
    }

    fn board(&self) -> Result<&'a BoardInfo> {
        self.board.ok_or(Error::Failure)
    }

    fn open_board(&self) -> Result<&'a BoardInfo> {
        let board = self.board()?;
        if self.state != SessionState::Open {
            log::error!("Flash session is not open");
            return Err(Error::Failure);
        }
        Ok(board)
    }

    fn current_algo(&self, board: &'a BoardInfo) -> Result<(Resolved, &'a ProgramTarget)> {
        match self.current {
            Some(current) => Ok((current, &board.target.algorithms[current.algo])),
            None => {
                log::error!("No flash algorithm selected");
                Err(Error::Internal)
            }
        }
    }

    /// Open a programming session
    ///
    /// Checks the board description, puts the target into programming reset
    /// and caches the default region. Calling it on an open session starts
    /// over.
    pub fn init(&mut self) -> Result<()> {
        log::debug!("target_flash init()");
        let board = self.board()?;

        board.target.validate()?;
        if let Some(algo) = board.target.algorithms.iter().find(|a| !a.is_layout_valid()) {
            log::error!(
                "Flash algorithm '{}' overlaps its page buffer or stack",
                algo.name
            );
            return Err(Error::InvalidConfig);
        }

        self.current = None;
        self.loaded_algo = None;
        self.last_func = FlashFunc::Nop;

        self.driver.set_state(TargetState::ResetProgram).map_err(|e| {
            log::error!("Failed to reset target for programming: {}", e);
            Error::Reset
        })?;

        self.default_region = resolve::default_region(&board.target);
        self.state = SessionState::Open;
        Ok(())
    }

    /// Close the session
    ///
    /// Tears down the active algorithm function and applies the reset
    /// policy. The session is closed even if teardown fails; the first
    /// error is returned afterwards.
    pub fn uninit(&mut self) -> Result<()> {
        log::debug!("target_flash uninit()");
        let board = self.open_board()?;

        let teardown = self.finish_func(board);
        if let Err(e) = teardown {
            log::warn!("Flash algorithm teardown failed: {}", e);
        }

        let reset = if self.settings.auto_reset {
            TargetState::ResetRun
        } else {
            TargetState::ResetProgram
        };
        log::debug!("target set state {:?}", reset);
        let reset_result = self
            .driver
            .set_state(reset)
            .and_then(|_| self.driver.set_state(TargetState::PostFlashReset))
            .map_err(|e| {
                log::error!("Failed to reset target after programming: {}", e);
                Error::Reset
            });

        self.state = SessionState::Closed;
        self.current = None;
        teardown.and(reset_result)
    }

    /// Select the flash algorithm for `addr`
    ///
    /// Fails with [`Error::AlgoMissing`] and keeps the previous selection if
    /// no region with an algorithm governs `addr`. The previous algorithm is
    /// not uninitialised.
    pub fn set(&mut self, addr: u32) -> Result<()> {
        let board = self.open_board()?;

        match resolve::resolve(&board.target, self.default_region, addr) {
            Some(resolved) => {
                if self.current.map(|c| c.algo) != Some(resolved.algo) {
                    log::debug!(
                        "Selected flash algorithm '{}' for 0x{:08X} (region start 0x{:08X})",
                        board.target.algorithms[resolved.algo].name,
                        addr,
                        resolved.flash_start
                    );
                }
                self.current = Some(resolved);
                Ok(())
            }
            None => {
                log::warn!("No flash algorithm for address 0x{:08X}", addr);
                Err(Error::AlgoMissing)
            }
        }
    }

    /// Program `data` at `addr`
    ///
    /// The data is split into chunks of at most `program_buffer_size` bytes,
    /// programmed at contiguous increasing addresses.
    pub fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        log::trace!("target_flash program_page(0x{:08X}, {} bytes)", addr, data.len());
        let board = self.open_board()?;
        let (_, algo) = self.current_algo(board)?;

        if self.family.security_bits_set(addr, data) {
            log::error!("Refusing to program security bits at 0x{:08X}", addr);
            return Err(Error::SecurityBits);
        }

        let mut chunk_addr = addr;
        for chunk in data.chunks(algo.program_buffer_size as usize) {
            self.start_func(board, FlashFunc::Program)?;
            log::trace!("ProgramPage 0x{:08X} ({} bytes)", chunk_addr, chunk.len());

            let status = self.driver.program_page(algo, chunk_addr, chunk)?;
            check_status(AlgoOp::ProgramPage, chunk_addr, status)?;

            if self.settings.verify {
                self.verify_chunk(board, algo, chunk_addr, chunk)?;
            }
            chunk_addr = chunk_addr.wrapping_add(chunk.len() as u32);
        }

        Ok(())
    }

    /// Read flash contents at `addr` into `buf`
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.open_board()?;
        self.driver.read_flash(addr, buf)
    }

    /// Erase the sector starting at `addr`
    pub fn erase_sector(&mut self, addr: u32) -> Result<()> {
        log::trace!("target_flash erase_sector(0x{:08X})", addr);
        let board = self.open_board()?;
        let (_, algo) = self.current_algo(board)?;

        let size = resolve::sector_size(&board.target.sectors, addr)?;
        if addr % size != 0 {
            log::error!(
                "Erase address 0x{:08X} is not aligned to its {} byte sector",
                addr,
                size
            );
            return Err(Error::EraseSector);
        }

        self.start_func(board, FlashFunc::Erase)?;
        let status = self.driver.erase_sector(algo, addr)?;
        check_status(AlgoOp::EraseSector, addr, status)
    }

    /// Erase every flash region
    ///
    /// Regions without an algorithm and regions whose algorithm is flagged
    /// [`AlgoFlags::SKIP_CHIP_ERASE`] are left alone. When the target asks
    /// for it, the session is re-initialised afterwards.
    pub fn erase_chip(&mut self) -> Result<()> {
        log::debug!("target_flash erase_chip()");
        let board = self.open_board()?;
        let target = &board.target;

        for region in &target.flash_regions {
            let resolved = match resolve::resolve(target, self.default_region, region.start) {
                Some(resolved) => resolved,
                None => {
                    log::debug!(
                        "Skipping chip erase of region 0x{:08X}: no flash algorithm",
                        region.start
                    );
                    continue;
                }
            };

            let algo = &target.algorithms[resolved.algo];
            if algo.algo_flags.contains(AlgoFlags::SKIP_CHIP_ERASE) {
                log::debug!(
                    "Skipping chip erase of region 0x{:08X} ('{}')",
                    region.start,
                    algo.name
                );
                continue;
            }

            log::debug!("EraseChip on region 0x{:08X} ('{}')", region.start, algo.name);
            self.current = Some(Resolved {
                algo: resolved.algo,
                flash_start: region.start,
            });
            self.start_func(board, FlashFunc::Erase)?;
            let status = self.driver.erase_chip(algo)?;
            check_status(AlgoOp::EraseChip, region.start, status)?;
        }

        if target.erase_reset {
            return self.init();
        }
        Ok(())
    }

    /// Preferred program page size at `addr`
    pub fn program_page_min_size(&self, addr: u32) -> Result<u32> {
        let board = self.open_board()?;
        resolve::program_page_min_size(&board.target.sectors, addr)
    }

    /// Sector size at `addr`
    pub fn erase_sector_size(&self, addr: u32) -> Result<u32> {
        let board = self.open_board()?;
        resolve::sector_size(&board.target.sectors, addr)
    }

    /// Whether a session is open
    pub fn busy(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Make the current algorithm resident and initialised for `func`
    ///
    /// Switching functions calls `UnInit(old)` then `Init(flash_start, 0, new)`.
    /// Algorithms flagged [`AlgoFlags::SINGLE_INIT_TYPE`] are initialised
    /// once and only uninitialised when going back to [`FlashFunc::Nop`].
    fn start_func(&mut self, board: &'a BoardInfo, func: FlashFunc) -> Result<()> {
        let (current, algo) = self.current_algo(board)?;

        if self.loaded_algo != Some(current.algo) {
            self.loaded_algo = None;
            self.last_func = FlashFunc::Nop;
            self.driver.load(algo).map_err(|e| {
                log::error!("Failed to download flash algorithm '{}': {}", algo.name, e);
                Error::AlgoDownload
            })?;
            self.loaded_algo = Some(current.algo);
        }

        // Same function but a different region start needs a fresh Init()
        let restart = self.last_func != FlashFunc::Nop && self.func_start != current.flash_start;
        if self.last_func == func && !restart {
            return Ok(());
        }

        let single = algo.algo_flags.contains(AlgoFlags::SINGLE_INIT_TYPE);

        if self.last_func != FlashFunc::Nop && (restart || !single || func == FlashFunc::Nop) {
            let status = self.driver.uninit(algo, self.last_func)?;
            if status != 0 {
                log::error!("UnInit({:?}) failed with status 0x{:08X}", self.last_func, status);
                return Err(Error::UnInit);
            }
            self.last_func = FlashFunc::Nop;
        }

        if func != FlashFunc::Nop && (restart || !single || self.last_func == FlashFunc::Nop) {
            let status = self.driver.init(algo, current.flash_start, 0, func)?;
            if status != 0 {
                log::error!(
                    "Init(0x{:08X}, {:?}) failed with status 0x{:08X}",
                    current.flash_start,
                    func,
                    status
                );
                self.last_func = FlashFunc::Nop;
                return Err(Error::Init);
            }
            self.func_start = current.flash_start;
        }

        self.last_func = func;
        Ok(())
    }

    /// Uninitialise whatever function the resident algorithm runs
    fn finish_func(&mut self, board: &'a BoardInfo) -> Result<()> {
        let func = self.last_func;
        let algo = match self.loaded_algo {
            Some(idx) if func != FlashFunc::Nop => &board.target.algorithms[idx],
            _ => return Ok(()),
        };

        self.last_func = FlashFunc::Nop;
        let status = self.driver.uninit(algo, func)?;
        if status != 0 {
            log::error!("UnInit({:?}) failed with status 0x{:08X}", func, status);
            return Err(Error::UnInit);
        }
        Ok(())
    }

    fn verify_chunk(
        &mut self,
        board: &'a BoardInfo,
        algo: &'a ProgramTarget,
        addr: u32,
        data: &[u8],
    ) -> Result<()> {
        if algo.has_verify() {
            self.start_func(board, FlashFunc::Verify)?;
            let ret = self.driver.verify(algo, addr, data)?;

            let ok = if algo.algo_flags.contains(AlgoFlags::VERIFY_RETURNS_ADDRESS) {
                ret == addr.wrapping_add(data.len() as u32)
            } else {
                ret == 0
            };
            if !ok {
                log::error!(
                    "Verify of {} bytes at 0x{:08X} failed (returned 0x{:08X})",
                    data.len(),
                    addr,
                    ret
                );
                return Err(Error::WriteVerify);
            }
            return Ok(());
        }

        let mut buf = [0u8; READBACK_CHUNK];
        let mut chunk_addr = addr;
        for expected in data.chunks(READBACK_CHUNK) {
            let actual = &mut buf[..expected.len()];
            self.driver.read_flash(chunk_addr, actual)?;
            if actual != expected {
                log::error!("Verify failed at 0x{:08X}", chunk_addr);
                return Err(Error::WriteVerify);
            }
            chunk_addr = chunk_addr.wrapping_add(expected.len() as u32);
        }
        Ok(())
    }
}

fn check_status(op: AlgoOp, addr: u32, status: u32) -> Result<()> {
    if status == 0 {
        return Ok(());
    }
    let failure = AlgoFailure { op, addr, status };
    log::error!("{}", failure);
    Err(Error::Algorithm(failure))
}

impl<D: FlashAlgo + TargetControl> FlashIntf for TargetFlash<'_, D> {
    fn init(&mut self) -> Result<()> {
        TargetFlash::init(self)
    }

    fn uninit(&mut self) -> Result<()> {
        TargetFlash::uninit(self)
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        TargetFlash::program_page(self, addr, data)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        TargetFlash::read(self, addr, buf)
    }

    fn erase_sector(&mut self, addr: u32) -> Result<()> {
        TargetFlash::erase_sector(self, addr)
    }

    fn erase_chip(&mut self) -> Result<()> {
        TargetFlash::erase_chip(self)
    }

    fn program_page_min_size(&self, addr: u32) -> Result<u32> {
        TargetFlash::program_page_min_size(self, addr)
    }

    fn erase_sector_size(&self, addr: u32) -> Result<u32> {
        TargetFlash::erase_sector_size(self, addr)
    }

    fn busy(&self) -> bool {
        TargetFlash::busy(self)
    }

    fn set(&mut self, addr: u32) -> Result<()> {
        TargetFlash::set(self, addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{
        FamilyId, FlashRegion, RegionFlags, SectorInfo, SyscallContext, TargetConfig,
    };
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    const SECTOR: u32 = 0x1000;
    const FLASH_SIZE: usize = 0x4000;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Load(String),
        Init(u32, FlashFunc),
        UnInit(FlashFunc),
        EraseChip(String),
        EraseSector(u32),
        Program(u32, usize),
        Verify(u32, usize),
        State(TargetState),
    }

    /// Records every call and keeps a flash image for 0..FLASH_SIZE
    struct MockDriver {
        calls: Vec<Call>,
        mem: Vec<u8>,
        init_status: u32,
        erase_status: u32,
        /// Program writes 0x00 instead of the data at this address
        corrupt_at: Option<u32>,
        chip_start: u32,
    }

    impl Default for MockDriver {
        fn default() -> Self {
            Self {
                calls: Vec::new(),
                mem: vec![0xFF; FLASH_SIZE],
                init_status: 0,
                erase_status: 0,
                corrupt_at: None,
                chip_start: 0,
            }
        }
    }

    impl MockDriver {
        fn programs(&self) -> Vec<(u32, usize)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Program(addr, len) => Some((*addr, *len)),
                    _ => None,
                })
                .collect()
        }
    }

    impl FlashAlgo for MockDriver {
        fn load(&mut self, algo: &ProgramTarget) -> Result<()> {
            self.calls.push(Call::Load(algo.name.clone()));
            Ok(())
        }

        fn init(
            &mut self,
            _algo: &ProgramTarget,
            addr: u32,
            _clock: u32,
            func: FlashFunc,
        ) -> Result<u32> {
            self.calls.push(Call::Init(addr, func));
            self.chip_start = addr;
            Ok(self.init_status)
        }

        fn uninit(&mut self, _algo: &ProgramTarget, func: FlashFunc) -> Result<u32> {
            self.calls.push(Call::UnInit(func));
            Ok(0)
        }

        fn erase_chip(&mut self, algo: &ProgramTarget) -> Result<u32> {
            self.calls.push(Call::EraseChip(algo.name.clone()));
            let start = self.chip_start as usize;
            let end = (start + 0x2000).min(FLASH_SIZE);
            self.mem[start..end].fill(0xFF);
            Ok(0)
        }

        fn erase_sector(&mut self, _algo: &ProgramTarget, addr: u32) -> Result<u32> {
            self.calls.push(Call::EraseSector(addr));
            let start = addr as usize;
            self.mem[start..start + SECTOR as usize].fill(0xFF);
            Ok(self.erase_status)
        }

        fn program_page(&mut self, _algo: &ProgramTarget, addr: u32, data: &[u8]) -> Result<u32> {
            self.calls.push(Call::Program(addr, data.len()));
            let start = addr as usize;
            for (i, byte) in data.iter().enumerate() {
                let value = if self.corrupt_at == Some(addr + i as u32) {
                    0
                } else {
                    *byte
                };
                self.mem[start + i] &= value;
            }
            Ok(0)
        }

        fn verify(&mut self, algo: &ProgramTarget, addr: u32, data: &[u8]) -> Result<u32> {
            self.calls.push(Call::Verify(addr, data.len()));
            let start = addr as usize;
            let matches = &self.mem[start..start + data.len()] == data;
            let returns_address = algo.algo_flags.contains(AlgoFlags::VERIFY_RETURNS_ADDRESS);
            let ret = match (matches, returns_address) {
                (true, true) => addr + data.len() as u32,
                (true, false) => 0,
                (false, true) => addr,
                (false, false) => 1,
            };
            Ok(ret)
        }

        fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
            let start = addr as usize;
            buf.copy_from_slice(&self.mem[start..start + buf.len()]);
            Ok(())
        }
    }

    impl TargetControl for MockDriver {
        fn set_state(&mut self, state: TargetState) -> Result<()> {
            self.calls.push(Call::State(state));
            Ok(())
        }
    }

    fn algorithm(name: &str, program_buffer_size: u32, algo_flags: AlgoFlags) -> ProgramTarget {
        ProgramTarget {
            name: name.into(),
            init: 0x2000_0021,
            uninit: 0x2000_0025,
            erase_chip: 0x2000_0029,
            erase_sector: 0x2000_002D,
            program_page: 0x2000_0031,
            verify: 0,
            sys_call: SyscallContext {
                breakpoint: 0x2000_0001,
                static_base: 0x2000_0100,
                stack_pointer: 0x2000_1000,
            },
            program_buffer: 0x2000_0400,
            algo_start: 0x2000_0000,
            algo_blob: vec![0xE00A_BE00],
            program_buffer_size,
            algo_flags,
        }
    }

    /// Two regions: 0x0000-0x1FFF (algo A), 0x2000-0x3FFF (algo B, default)
    fn board() -> BoardInfo {
        BoardInfo {
            board_id: "0000".into(),
            vendor: "Test".into(),
            name: "Test board".into(),
            family: FamilyId::Stub,
            target: TargetConfig {
                vendor: "Test".into(),
                part_number: "TEST1".into(),
                sectors: vec![SectorInfo::new(0, SECTOR), SectorInfo::new(0x1000, SECTOR)],
                flash_regions: vec![
                    FlashRegion::new(0x0000, 0x1FFF, Some(0)),
                    FlashRegion::new(0x2000, 0x3FFF, Some(1)).with_flags(RegionFlags::IS_DEFAULT),
                ],
                ram_regions: vec![],
                algorithms: vec![
                    algorithm("A", 512, AlgoFlags::empty()),
                    algorithm("B", 256, AlgoFlags::empty()),
                ],
                erase_reset: false,
            },
        }
    }

    fn open(board: &BoardInfo) -> TargetFlash<'_, MockDriver> {
        let mut flash = TargetFlash::new(MockDriver::default(), Some(board), Settings::default());
        flash.init().unwrap();
        flash
    }

    struct SecureAt(u32);

    impl TargetFamily for SecureAt {
        fn security_bits_set(&self, addr: u32, _data: &[u8]) -> bool {
            addr == self.0
        }
    }

    #[test]
    fn test_closed_session_fails() {
        let board = board();
        let mut flash = TargetFlash::new(MockDriver::default(), Some(&board), Settings::default());

        assert!(!flash.busy());
        assert_eq!(flash.set(0), Err(Error::Failure));
        assert_eq!(flash.program_page(0, &[0; 4]), Err(Error::Failure));
        assert_eq!(flash.erase_sector(0), Err(Error::Failure));
        assert_eq!(flash.erase_chip(), Err(Error::Failure));
        assert_eq!(flash.program_page_min_size(0), Err(Error::Failure));
        assert_eq!(flash.erase_sector_size(0), Err(Error::Failure));
        assert_eq!(flash.uninit(), Err(Error::Failure));
        assert!(flash.driver().calls.is_empty());

        flash.init().unwrap();
        assert!(flash.busy());
        flash.uninit().unwrap();
        assert_eq!(flash.set(0), Err(Error::Failure));
    }

    #[test]
    fn test_invalid_board_rejected_at_init() {
        let mut board = board();
        board.target.algorithms[0].program_buffer_size = 0;
        let mut flash = TargetFlash::new(MockDriver::default(), Some(&board), Settings::default());
        assert_eq!(flash.init(), Err(Error::InvalidConfig));
        assert!(!flash.busy());
        assert!(flash.driver().calls.is_empty());

        let mut dangling = self::board();
        dangling.target.flash_regions[0].algo = Some(7);
        let mut flash =
            TargetFlash::new(MockDriver::default(), Some(&dangling), Settings::default());
        assert_eq!(flash.init(), Err(Error::InvalidConfig));
        assert!(!flash.busy());
    }

    #[test]
    fn test_revisited_page_read_back() {
        let board = board();
        let mut flash = open(&board);
        flash.set(0).unwrap();
        flash.program_page(0x100, &[0x42; 16]).unwrap();

        let mut buf = [0u8; 32];
        flash.read(0x100, &mut buf).unwrap();
        assert_eq!(&buf[..16], &[0x42; 16]);
        assert!(buf[16..].iter().all(|&b| b == 0xFF));

        flash.uninit().unwrap();
        assert_eq!(flash.read(0x100, &mut buf), Err(Error::Failure));
    }

    #[test]
    fn test_no_board_fails() {
        let mut flash = TargetFlash::new(MockDriver::default(), None, Settings::default());
        assert_eq!(flash.init(), Err(Error::Failure));
        assert_eq!(flash.uninit(), Err(Error::Failure));
        assert!(!flash.busy());
    }

    #[test]
    fn test_operations_without_algorithm() {
        let board = board();
        let mut flash = open(&board);
        assert_eq!(flash.program_page(0, &[0; 4]), Err(Error::Internal));
        assert_eq!(flash.erase_sector(0), Err(Error::Internal));
    }

    #[test]
    fn test_erase_sector_alignment() {
        let board = board();
        let mut flash = open(&board);
        flash.set(0).unwrap();
        flash.driver_mut().mem.fill(0x00);

        flash.erase_sector(0).unwrap();
        assert!(flash.driver().mem[..0x1000].iter().all(|&b| b == 0xFF));
        assert!(flash.driver().mem[0x1000..].iter().all(|&b| b == 0x00));

        assert_eq!(flash.erase_sector(0x800), Err(Error::EraseSector));
        let erases = flash
            .driver()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::EraseSector(_)))
            .count();
        assert_eq!(erases, 1);
    }

    #[test]
    fn test_erase_sector_succeeds_only_when_aligned() {
        let board = board();
        let mut flash = open(&board);
        flash.set(0).unwrap();
        for addr in (0..0x2000).step_by(0x200) {
            let result = flash.erase_sector(addr);
            assert_eq!(result.is_ok(), addr % SECTOR == 0, "addr 0x{:X}", addr);
        }
    }

    #[test]
    fn test_set_resolves_region_and_default() {
        let board = board();
        let mut flash = open(&board);

        flash.set(0x5000).unwrap();
        assert_eq!(flash.current_algorithm().unwrap().name, "B");
        assert_eq!(flash.flash_start(), Some(0x2000));

        flash.set(0x1000).unwrap();
        assert_eq!(flash.current_algorithm().unwrap().name, "A");
        assert_eq!(flash.flash_start(), Some(0));
    }

    #[test]
    fn test_set_without_default_keeps_selection() {
        let mut board = board();
        board.target.flash_regions[1].flags = RegionFlags::empty();
        let mut flash = open(&board);

        flash.set(0x1000).unwrap();
        assert_eq!(flash.set(0x8000), Err(Error::AlgoMissing));
        assert_eq!(flash.current_algorithm().unwrap().name, "A");
        assert!(flash.busy());
    }

    #[test]
    fn test_program_page_chunking() {
        let board = board();
        let mut flash = open(&board);
        flash.set(0).unwrap();

        let data: Vec<u8> = (0..1300u32).map(|i| i as u8).collect();
        flash.program_page(0, &data).unwrap();

        assert_eq!(flash.driver().programs(), vec![(0, 512), (0x200, 512), (0x400, 276)]);
        assert_eq!(&flash.driver().mem[..1300], &data[..]);
    }

    #[test]
    fn test_program_page_exact_multiple() {
        let board = board();
        let mut flash = open(&board);
        flash.set(0x2000).unwrap();
        flash.program_page(0x2000, &[0x5A; 768]).unwrap();
        assert_eq!(
            flash.driver().programs(),
            vec![(0x2000, 256), (0x2100, 256), (0x2200, 256)]
        );
    }

    #[test]
    fn test_security_bits_refused() {
        let board = board();
        let hook = SecureAt(0x1000);
        let mut flash = TargetFlash::new(MockDriver::default(), Some(&board), Settings::default())
            .with_family(&hook);
        flash.init().unwrap();
        flash.set(0x1000).unwrap();

        assert_eq!(flash.program_page(0x1000, &[0; 16]), Err(Error::SecurityBits));
        assert!(flash.driver().programs().is_empty());
        assert!(flash.driver().mem.iter().all(|&b| b == 0xFF));

        // A different address is unaffected
        flash.program_page(0x0, &[0; 16]).unwrap();
    }

    #[test]
    fn test_function_switching() {
        let board = board();
        let mut flash = open(&board);
        flash.set(0).unwrap();
        flash.erase_sector(0).unwrap();
        flash.program_page(0, &[0x11; 16]).unwrap();
        flash.uninit().unwrap();

        assert_eq!(
            flash.driver().calls,
            vec![
                Call::State(TargetState::ResetProgram),
                Call::Load("A".into()),
                Call::Init(0, FlashFunc::Erase),
                Call::EraseSector(0),
                Call::UnInit(FlashFunc::Erase),
                Call::Init(0, FlashFunc::Program),
                Call::Program(0, 16),
                Call::UnInit(FlashFunc::Program),
                Call::State(TargetState::ResetRun),
                Call::State(TargetState::PostFlashReset),
            ]
        );
    }

    #[test]
    fn test_single_init_type() {
        let mut board = board();
        board.target.algorithms[0].algo_flags = AlgoFlags::SINGLE_INIT_TYPE;
        let mut flash = open(&board);
        flash.set(0).unwrap();
        flash.erase_sector(0).unwrap();
        flash.program_page(0, &[0x11; 16]).unwrap();
        flash.uninit().unwrap();

        let calls = &flash.driver().calls;
        let inits: Vec<_> = calls.iter().filter(|c| matches!(c, Call::Init(..))).collect();
        let uninits: Vec<_> = calls.iter().filter(|c| matches!(c, Call::UnInit(..))).collect();
        assert_eq!(inits, vec![&Call::Init(0, FlashFunc::Erase)]);
        assert_eq!(uninits, vec![&Call::UnInit(FlashFunc::Program)]);
    }

    #[test]
    fn test_algorithm_switch_downloads_blob() {
        let board = board();
        let mut flash = open(&board);
        flash.set(0).unwrap();
        flash.program_page(0, &[0x22; 8]).unwrap();
        flash.set(0x2000).unwrap();
        flash.program_page(0x2000, &[0x33; 8]).unwrap();

        let calls = &flash.driver().calls;
        let load_b = calls.iter().position(|c| *c == Call::Load("B".into())).unwrap();
        assert_eq!(calls[load_b + 1], Call::Init(0x2000, FlashFunc::Program));
        assert_eq!(calls[load_b + 2], Call::Program(0x2000, 8));
        // The previous algorithm is not uninitialised on a switch
        assert!(!calls[..load_b].contains(&Call::UnInit(FlashFunc::Program)));
    }

    #[test]
    fn test_erase_chip_skips_flagged_regions() {
        let mut board = board();
        board.target.algorithms[1].algo_flags = AlgoFlags::SKIP_CHIP_ERASE;
        let mut flash = open(&board);
        flash.erase_chip().unwrap();

        let erases: Vec<_> = flash
            .driver()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::EraseChip(_)))
            .cloned()
            .collect();
        assert_eq!(erases, vec![Call::EraseChip("A".into())]);
    }

    #[test]
    fn test_erase_chip_all_regions() {
        let board = board();
        let mut flash = open(&board);
        flash.driver_mut().mem.fill(0);
        flash.erase_chip().unwrap();

        let calls = &flash.driver().calls;
        assert!(calls.contains(&Call::Init(0, FlashFunc::Erase)));
        assert!(calls.contains(&Call::Init(0x2000, FlashFunc::Erase)));
        assert!(flash.driver().mem.iter().all(|&b| b == 0xFF));
        assert!(flash.busy());
    }

    #[test]
    fn test_erase_chip_skips_region_without_algorithm() {
        let mut board = board();
        board.target.flash_regions[0].algo = None;
        let mut flash = open(&board);
        flash.erase_chip().unwrap();

        let erases = flash
            .driver()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::EraseChip(_)))
            .count();
        assert_eq!(erases, 1);
    }

    #[test]
    fn test_erase_chip_reinit() {
        let mut board = board();
        board.target.erase_reset = true;
        let mut flash = open(&board);
        flash.set(0).unwrap();
        flash.erase_chip().unwrap();

        let resets = flash
            .driver()
            .calls
            .iter()
            .filter(|c| **c == Call::State(TargetState::ResetProgram))
            .count();
        assert_eq!(resets, 2);
        // Re-init clears the selection
        assert!(flash.current_algorithm().is_none());
        assert!(flash.busy());
    }

    #[test]
    fn test_uninit_without_auto_reset() {
        let board = board();
        let settings = Settings {
            auto_reset: false,
            ..Settings::default()
        };
        let mut flash = TargetFlash::new(MockDriver::default(), Some(&board), settings);
        flash.init().unwrap();
        flash.uninit().unwrap();

        assert_eq!(
            flash.driver().calls,
            vec![
                Call::State(TargetState::ResetProgram),
                Call::State(TargetState::ResetProgram),
                Call::State(TargetState::PostFlashReset),
            ]
        );
        assert_eq!(flash.state(), SessionState::Closed);
    }

    #[test]
    fn test_init_failure() {
        let board = board();
        let mut flash = open(&board);
        flash.driver_mut().init_status = 1;
        flash.set(0).unwrap();
        assert_eq!(flash.erase_sector(0), Err(Error::Init));

        // Not sticky: a later call retries Init()
        flash.driver_mut().init_status = 0;
        flash.erase_sector(0).unwrap();
    }

    #[test]
    fn test_algorithm_status_reported() {
        let board = board();
        let mut flash = open(&board);
        flash.driver_mut().erase_status = 0x42;
        flash.set(0x1000).unwrap();

        assert_eq!(
            flash.erase_sector(0x1000),
            Err(Error::Algorithm(AlgoFailure {
                op: AlgoOp::EraseSector,
                addr: 0x1000,
                status: 0x42,
            }))
        );
    }

    #[test]
    fn test_readback_verify_failure() {
        let board = board();
        let mut flash = open(&board);
        flash.driver_mut().corrupt_at = Some(0x10);
        flash.set(0).unwrap();
        assert_eq!(flash.program_page(0, &[0xA5; 32]), Err(Error::WriteVerify));
    }

    #[test]
    fn test_verify_disabled() {
        let board = board();
        let settings = Settings {
            verify: false,
            ..Settings::default()
        };
        let mut flash = TargetFlash::new(MockDriver::default(), Some(&board), settings);
        flash.init().unwrap();
        flash.driver_mut().corrupt_at = Some(0x10);
        flash.set(0).unwrap();
        flash.program_page(0, &[0xA5; 32]).unwrap();
    }

    #[test]
    fn test_verify_entry_point() {
        let mut board = board();
        board.target.algorithms[0].verify = 0x2000_0035;
        board.target.algorithms[0].algo_flags = AlgoFlags::VERIFY_RETURNS_ADDRESS;
        let mut flash = open(&board);
        flash.set(0).unwrap();
        flash.program_page(0, &[0x3C; 600]).unwrap();

        let calls = &flash.driver().calls;
        assert!(calls.contains(&Call::Verify(0, 512)));
        assert!(calls.contains(&Call::Verify(0x200, 88)));
        assert!(calls.contains(&Call::Init(0, FlashFunc::Verify)));

        flash.driver_mut().corrupt_at = Some(0x1000);
        flash.erase_sector(0x1000).unwrap();
        assert_eq!(flash.program_page(0x1000, &[0x3C; 16]), Err(Error::WriteVerify));
    }

    #[test]
    fn test_sizes() {
        let board = board();
        let flash = open(&board);
        assert_eq!(flash.erase_sector_size(0x1800), Ok(SECTOR));
        assert_eq!(flash.program_page_min_size(0x1800), Ok(256));
    }
}
