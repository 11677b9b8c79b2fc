//! Crystal domain state.
//!
//! The domain owns the single device buffer every simulation stage binds.
//! Its layout is an 8-byte header followed by a row-major window of cells:
//!
//! ```text
//! offset 0  radius: u32
//! offset 4  generation: u32
//! offset 8  cells[(2 * MAX_RADIUS + 1)^2]
//! ```
//!
//! Cell `(q, r)` lives at `(r + radius) * (2 * radius + 1) + (q + radius)`,
//! so the window shrinks with the radius and the tail of the buffer is
//! padding. Changing the radius or the background level rewrites the whole
//! window because ring classification depends on both.

use bytemuck::{Pod, Zeroable};
use rime_common::Axial;
use tracing::{debug, info};
use wgpu::{Buffer, BufferUsages, Device, Queue};

use crate::params::SimulationParameters;

/// Largest supported domain radius.
pub const MAX_RADIUS: u32 = 256;

/// Radius used when none is configured.
pub const DEFAULT_RADIUS: u32 = 50;

/// Byte length of the `{radius, generation}` header.
pub const HEADER_BYTE_LENGTH: u64 = 8;

/// Byte offset of the generation field inside the header.
pub const GENERATION_OFFSET: u64 = 4;

/// Byte stride of one cell.
pub const CELL_BYTE_LENGTH: u64 = 20;

/// Side of the window at the maximum radius.
pub const MAX_WINDOW_SIDE: u64 = 2 * MAX_RADIUS as u64 + 1;

/// Total byte length of the domain buffer.
pub const DOMAIN_BYTE_LENGTH: u64 =
    HEADER_BYTE_LENGTH + MAX_WINDOW_SIDE * MAX_WINDOW_SIDE * CELL_BYTE_LENGTH;

/// Workgroup edge shared by every per-cell compute program.
pub const WORKGROUP_SIZE: u32 = 8;

/// One hex cell as stored on the device.
///
/// Both `value` and `diffusion` carry two slots; the header's generation
/// index names the slot holding the current state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct HexCell {
    /// Accumulated mass, one entry per generation slot
    pub value: [f32; 2],
    /// Vapour available for diffusion, one entry per generation slot
    pub diffusion: [f32; 2],
    /// Non-zero when the cell may accumulate mass
    pub receptive: u32,
}

impl HexCell {
    fn uniform(value: f32, diffusion: f32, receptive: bool) -> Self {
        Self {
            value: [value; 2],
            diffusion: [diffusion; 2],
            receptive: u32::from(receptive),
        }
    }

    /// Whether the cell is marked receptive.
    #[must_use]
    pub const fn is_receptive(&self) -> bool {
        self.receptive != 0
    }
}

/// Domain buffer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DomainHeader {
    /// Domain radius in rings
    pub radius: u32,
    /// Active ping-pong slot (0 or 1)
    pub generation: u32,
}

/// Ping-pong slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Generation {
    /// Slot 0 holds the current state
    #[default]
    Zero,
    /// Slot 1 holds the current state
    One,
}

impl Generation {
    /// The other slot.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    /// Slot index as written to the header.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// Initial role of a cell, decided by its ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellClass {
    /// Ring 0: the frozen seed
    Seed,
    /// Ring 1: receptive boundary of the seed
    FirstRing,
    /// Ring 2
    SecondRing,
    /// Rings 3 to radius
    Interior,
    /// Beyond the radius, inside the window corners
    Padding,
}

/// Classifies a coordinate for a domain of the given radius.
#[must_use]
pub fn classify(coord: Axial, radius: u32) -> CellClass {
    match coord.ring() {
        ring if ring > radius => CellClass::Padding,
        0 => CellClass::Seed,
        1 => CellClass::FirstRing,
        2 => CellClass::SecondRing,
        _ => CellClass::Interior,
    }
}

/// Initial contents of a cell.
///
/// `w` is the per-neighbour diffusion weight (`alpha / 12`).
#[must_use]
pub fn seed_cell(class: CellClass, background: f32, w: f32) -> HexCell {
    match class {
        CellClass::Seed => HexCell::uniform(1.0, 0.0, true),
        CellClass::FirstRing => HexCell::uniform(background, background * w * 3.0, true),
        CellClass::SecondRing => HexCell::uniform(background, background * w * 5.0, false),
        CellClass::Interior => HexCell::uniform(background, background, false),
        CellClass::Padding => HexCell::zeroed(),
    }
}

/// Number of workgroups along each axis for per-cell dispatches.
///
/// Covers a `(2 * radius + 2)` square so every window cell gets an
/// invocation; out-of-window invocations exit early.
#[must_use]
pub const fn cell_workgroups(radius: u32) -> u32 {
    (2 * radius + 2).div_ceil(WORKGROUP_SIZE)
}

/// Device allocation of the domain.
struct DomainGpu {
    buffer: Buffer,
}

/// Authoritative hex-grid state and its device buffer.
///
/// Mutators applied before [`CrystalDomain::initialise`] only record the
/// new value; the next serialisation picks it up.
pub struct CrystalDomain {
    /// Domain radius in rings
    radius: u32,
    /// Active ping-pong slot
    generation: Generation,
    /// Vapour level of the surrounding air
    background_level: f32,
    /// Diffusion gain (alpha)
    diffusion_gain: f32,
    /// Device buffer, once allocated
    gpu: Option<DomainGpu>,
}

impl CrystalDomain {
    /// Creates an unallocated domain with the given radius.
    #[must_use]
    pub fn new(radius: u32, parameters: &SimulationParameters) -> Self {
        Self {
            radius: clamp_radius(radius),
            generation: Generation::Zero,
            background_level: parameters.beta(),
            diffusion_gain: parameters.alpha(),
            gpu: None,
        }
    }

    /// Allocates the device buffer on first call and serialises the cells.
    ///
    /// Later calls reuse the buffer and only re-serialise.
    pub fn initialise(&mut self, device: &Device, queue: &Queue) -> &Buffer {
        self.generation = Generation::Zero;
        let bytes = self.serialize();

        let gpu = self.gpu.get_or_insert_with(|| {
            info!(
                "Allocating crystal domain buffer ({} bytes, max radius {})",
                DOMAIN_BYTE_LENGTH, MAX_RADIUS
            );
            DomainGpu {
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Crystal Domain Buffer"),
                    size: DOMAIN_BYTE_LENGTH,
                    usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                }),
            }
        });

        queue.write_buffer(&gpu.buffer, 0, &bytes);
        &gpu.buffer
    }

    /// Returns the device buffer if allocated.
    #[must_use]
    pub fn buffer(&self) -> Option<&Buffer> {
        self.gpu.as_ref().map(|gpu| &gpu.buffer)
    }

    /// Current radius.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Current ping-pong slot.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Current background level.
    #[must_use]
    pub const fn background_level(&self) -> f32 {
        self.background_level
    }

    /// Current diffusion gain.
    #[must_use]
    pub const fn diffusion_gain(&self) -> f32 {
        self.diffusion_gain
    }

    /// Sets the radius, clamped into `[1, MAX_RADIUS]`, and re-serialises.
    pub fn set_radius(&mut self, queue: &Queue, radius: u32) {
        self.radius = clamp_radius(radius);
        self.upload(queue);
    }

    /// Sets the background level and re-serialises.
    ///
    /// The level is not validated.
    pub fn set_background_level(&mut self, queue: &Queue, level: f32) {
        self.background_level = level;
        self.upload(queue);
    }

    /// Adopts alpha and beta from `parameters` and re-serialises.
    pub fn apply_parameters(&mut self, queue: &Queue, parameters: &SimulationParameters) {
        self.diffusion_gain = parameters.alpha();
        self.background_level = parameters.beta();
        self.upload(queue);
    }

    /// Flips the ping-pong slot, writing only the 4-byte generation field.
    pub fn advance_generation(&mut self, queue: &Queue) {
        self.generation = self.generation.toggled();
        if let Some(gpu) = &self.gpu {
            queue.write_buffer(
                &gpu.buffer,
                GENERATION_OFFSET,
                bytemuck::bytes_of(&self.generation.index()),
            );
        }
    }

    /// Workgroups along each axis for per-cell dispatches.
    #[must_use]
    pub const fn workgroups(&self) -> u32 {
        cell_workgroups(self.radius)
    }

    /// The header as it is serialised.
    #[must_use]
    pub const fn header(&self) -> DomainHeader {
        DomainHeader {
            radius: self.radius,
            generation: self.generation.index(),
        }
    }

    /// Serialised cells of the current window, row-major over `r` then `q`.
    #[must_use]
    pub fn cells(&self) -> Vec<HexCell> {
        let radius = self.radius as i32;
        let w = self.diffusion_gain / 12.0;
        let mut cells = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
        for r in -radius..=radius {
            for q in -radius..=radius {
                let class = classify(Axial::new(q, r), self.radius);
                cells.push(seed_cell(class, self.background_level, w));
            }
        }
        cells
    }

    /// Header plus window bytes, exactly as uploaded.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let cells = self.cells();
        let mut bytes = Vec::with_capacity(
            HEADER_BYTE_LENGTH as usize + cells.len() * CELL_BYTE_LENGTH as usize,
        );
        bytes.extend_from_slice(bytemuck::bytes_of(&self.header()));
        bytes.extend_from_slice(bytemuck::cast_slice(&cells));
        bytes
    }

    /// Resets the generation and writes the serialised window.
    fn upload(&mut self, queue: &Queue) {
        self.generation = Generation::Zero;
        let Some(gpu) = &self.gpu else {
            return;
        };
        let bytes = self.serialize();
        queue.write_buffer(&gpu.buffer, 0, &bytes);
        debug!(
            "Serialised crystal domain: radius {}, background {}, {} bytes",
            self.radius,
            self.background_level,
            bytes.len()
        );
    }
}

/// Clamps a radius into `[1, MAX_RADIUS]`.
#[must_use]
pub fn clamp_radius(radius: u32) -> u32 {
    radius.clamp(1, MAX_RADIUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn domain(radius: u32, beta: f32) -> CrystalDomain {
        CrystalDomain::new(radius, &SimulationParameters::new(1.592, beta, 0.001))
    }

    fn cell_at(domain: &CrystalDomain, q: i32, r: i32) -> HexCell {
        let index = Axial::new(q, r)
            .window_index(domain.radius())
            .expect("coordinate inside window");
        domain.cells()[index]
    }

    #[test]
    fn test_radius_is_clamped() {
        assert_eq!(domain(0, 0.3).radius(), 1);
        assert_eq!(domain(10_000, 0.3).radius(), MAX_RADIUS);
    }

    #[test]
    fn test_seed_ignores_background() {
        for beta in [0.0, 0.3, 0.9] {
            let d = domain(5, beta);
            let seed = cell_at(&d, 0, 0);
            assert_eq!(seed.value, [1.0, 1.0]);
            assert!(seed.is_receptive());
            assert_eq!(seed.diffusion, [0.0, 0.0]);
        }
    }

    #[test]
    fn test_ring_classification() {
        let d = domain(5, 0.4);
        let w = 1.592 / 12.0;

        let first = cell_at(&d, 1, -1);
        assert!(first.is_receptive());
        assert!((first.diffusion[0] - 0.4 * w * 3.0).abs() < 1e-7);

        let second = cell_at(&d, 2, 0);
        assert!(!second.is_receptive());
        assert!((second.diffusion[1] - 0.4 * w * 5.0).abs() < 1e-7);

        let interior = cell_at(&d, 0, -5);
        assert_eq!(interior.value, [0.4, 0.4]);
        assert_eq!(interior.diffusion, [0.4, 0.4]);
    }

    #[test]
    fn test_ring_beyond_radius_is_zero() {
        let d = domain(5, 0.4);
        // (5, 1) has s = -6, so it lies on ring 6
        let padding = cell_at(&d, 5, 1);
        assert_eq!(padding, HexCell::zeroed());
        assert_eq!(classify(Axial::new(5, 1), 5), CellClass::Padding);
    }

    #[test]
    fn test_serialize_layout() {
        let d = domain(3, 0.3);
        let bytes = d.serialize();
        assert_eq!(bytes.len(), 8 + 49 * 20);
        let header: DomainHeader = bytemuck::pod_read_unaligned(&bytes[..8]);
        assert_eq!(header, DomainHeader { radius: 3, generation: 0 });
    }

    #[test]
    fn test_generation_toggle() {
        assert_eq!(Generation::Zero.toggled(), Generation::One);
        assert_eq!(Generation::One.toggled().index(), 0);
    }

    #[test]
    fn test_workgroups_cover_window() {
        assert_eq!(cell_workgroups(1), 1);
        assert_eq!(cell_workgroups(3), 1);
        assert_eq!(cell_workgroups(50), 13);
        assert!(cell_workgroups(MAX_RADIUS) * WORKGROUP_SIZE >= 2 * MAX_RADIUS + 1);
    }

    #[test]
    fn test_buffer_holds_max_window() {
        let d = domain(MAX_RADIUS, 0.3);
        assert_eq!(d.serialize().len() as u64, DOMAIN_BYTE_LENGTH);
    }

    proptest! {
        #[test]
        fn prop_serialization_is_deterministic(
            radius in 1u32..40,
            beta in 0.0f32..1.0,
            alpha in 0.0f32..4.0,
        ) {
            let params = SimulationParameters::new(alpha, beta, 0.001);
            let a = CrystalDomain::new(radius, &params).serialize();
            let b = CrystalDomain::new(radius, &params).serialize();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_receptive_only_near_seed(radius in 3u32..30) {
            let d = domain(radius, 0.3);
            let side = (2 * radius + 1) as usize;
            for (index, cell) in d.cells().iter().enumerate() {
                let q = (index % side) as i32 - radius as i32;
                let r = (index / side) as i32 - radius as i32;
                prop_assert_eq!(cell.is_receptive(), Axial::new(q, r).ring() <= 1);
            }
        }
    }
}
