use findfoci_volume::VolumeSize;

/// In-plane offsets in clockwise order starting from north.
const RING_DX: [i64; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const RING_DY: [i64; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];

#[derive(Clone, Copy, Debug)]
struct Direction {
    dx: i64,
    dy: i64,
    dz: i64,
    offset: isize,
    flat: bool,
}

/// The 8-connected (2D) or 26-connected (3D) neighbourhood of a volume.
///
/// Directions are enumerated in a fixed order: the 8 in-plane neighbours
/// clockwise from north, then for 3D volumes the slice below (centre first,
/// then the ring) and the slice above in the same order.
#[derive(Clone, Debug)]
pub struct Neighbourhood {
    size: VolumeSize,
    directions: Vec<Direction>,
}

impl Neighbourhood {
    /// Build the neighbourhood for a volume size.
    pub fn new(size: VolumeSize) -> Self {
        let w = size.width as i64;
        let slice = size.slice_len() as i64;
        let make = |dx: i64, dy: i64, dz: i64| Direction {
            dx,
            dy,
            dz,
            offset: (dz * slice + dy * w + dx) as isize,
            flat: (dx != 0) as u8 + (dy != 0) as u8 + (dz != 0) as u8 == 1,
        };

        let mut directions: Vec<Direction> =
            (0..8).map(|d| make(RING_DX[d], RING_DY[d], 0)).collect();
        if size.is_3d() {
            for dz in [-1, 1] {
                directions.push(make(0, 0, dz));
                directions.extend((0..8).map(|d| make(RING_DX[d], RING_DY[d], dz)));
            }
        }

        Self { size, directions }
    }

    /// Number of directions.
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Whether the neighbourhood has no directions.
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// Whether direction `d` moves along exactly one axis.
    pub fn is_flat_edge(&self, d: usize) -> bool {
        self.directions[d].flat
    }

    fn is_inner(&self, x: usize, y: usize, z: usize) -> bool {
        let s = &self.size;
        x > 0
            && y > 0
            && x + 1 < s.width
            && y + 1 < s.height
            && (!s.is_3d() || (z > 0 && z + 1 < s.depth))
    }

    /// The in-bounds neighbours of a pixel as `(direction, index)` pairs.
    ///
    /// # Example
    ///
    /// ```
    /// use findfoci::neighbors::Neighbourhood;
    /// use findfoci_volume::VolumeSize;
    ///
    /// let hood = Neighbourhood::new(VolumeSize::new_2d(3, 3));
    /// let corner: Vec<usize> = hood.neighbours(0).map(|(_, n)| n).collect();
    /// assert_eq!(corner, vec![1, 4, 3]);
    /// assert_eq!(hood.neighbours(4).count(), 8);
    /// ```
    pub fn neighbours(&self, index: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (x, y, z) = self.size.coords(index);
        let inner = self.is_inner(x, y, z);
        let (w, h, d) = (
            self.size.width as i64,
            self.size.height as i64,
            self.size.depth as i64,
        );

        self.directions
            .iter()
            .enumerate()
            .filter_map(move |(dir, step)| {
                if inner {
                    return Some((dir, index.wrapping_add_signed(step.offset)));
                }
                let nx = x as i64 + step.dx;
                let ny = y as i64 + step.dy;
                let nz = z as i64 + step.dz;
                if nx < 0 || ny < 0 || nz < 0 || nx >= w || ny >= h || nz >= d {
                    return None;
                }
                Some((dir, index.wrapping_add_signed(step.offset)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbourhood_2d_order() {
        let hood = Neighbourhood::new(VolumeSize::new_2d(3, 3));
        assert_eq!(hood.len(), 8);
        let all: Vec<(usize, usize)> = hood.neighbours(4).collect();
        assert_eq!(
            all,
            vec![(0, 1), (1, 2), (2, 5), (3, 8), (4, 7), (5, 6), (6, 3), (7, 0)]
        );
        let flat: Vec<bool> = (0..8).map(|d| hood.is_flat_edge(d)).collect();
        assert_eq!(
            flat,
            vec![true, false, true, false, true, false, true, false]
        );
    }

    #[test]
    fn test_neighbourhood_3d() {
        let size = VolumeSize {
            width: 3,
            height: 3,
            depth: 3,
        };
        let hood = Neighbourhood::new(size);
        assert_eq!(hood.len(), 26);

        let centre = size.index(1, 1, 1);
        let all: Vec<(usize, usize)> = hood.neighbours(centre).collect();
        assert_eq!(all.len(), 26);
        assert_eq!(all[8], (8, size.index(1, 1, 0)));
        assert_eq!(all[17], (17, size.index(1, 1, 2)));
        assert!(hood.is_flat_edge(8));
        assert!(!hood.is_flat_edge(9));

        let corner: Vec<usize> = hood.neighbours(0).map(|(_, n)| n).collect();
        assert_eq!(corner.len(), 7);
    }

    #[test]
    fn test_neighbourhood_column() {
        let size = VolumeSize {
            width: 1,
            height: 1,
            depth: 3,
        };
        let hood = Neighbourhood::new(size);
        let middle: Vec<usize> = hood.neighbours(1).map(|(_, n)| n).collect();
        assert_eq!(middle, vec![0, 2]);
    }
}
