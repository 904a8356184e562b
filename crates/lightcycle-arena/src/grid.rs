//! The toroidal playing field.

use lightcycle_protocol::{Direction, PlayerId};

/// A cell coordinate, `(x, y)`.
pub type Cell = (u32, u32);

/// Width × height cells, each empty or holding one player's trail.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Option<PlayerId>>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, (x, y): Cell) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// The trail occupying `cell`, if any.
    pub fn get(&self, cell: Cell) -> Option<PlayerId> {
        self.index(cell).and_then(|i| self.cells[i])
    }

    pub fn is_free(&self, cell: Cell) -> bool {
        self.get(cell).is_none()
    }

    pub fn occupy(&mut self, cell: Cell, player: PlayerId) {
        if let Some(i) = self.index(cell) {
            self.cells[i] = Some(player);
        }
    }

    /// Frees `cell` if `player` holds it.
    pub fn release(&mut self, cell: Cell, player: PlayerId) {
        if let Some(i) = self.index(cell) {
            if self.cells[i] == Some(player) {
                self.cells[i] = None;
            }
        }
    }

    /// The cell one step from `from`, wrapping at the edges.
    pub fn step(&self, from: Cell, direction: Direction) -> Cell {
        wrap_step(from, direction, self.width, self.height)
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// Moves one cell in `direction` on a `width` × `height` torus.
pub fn wrap_step((x, y): Cell, direction: Direction, width: u32, height: u32) -> Cell {
    let (dx, dy) = direction.delta();
    let nx = (x as i64 + dx).rem_euclid(width.max(1) as i64);
    let ny = (y as i64 + dy).rem_euclid(height.max(1) as i64);
    (nx as u32, ny as u32)
}
