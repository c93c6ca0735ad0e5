/// Table mapping every original peak id to the id it was merged into.
///
/// Id 0 is the background; a dissolved peak maps to 0. A merge rewrites every
/// entry pointing at the absorbed id, so each entry points at a live id
/// after any sequence of merges.
///
/// # Example
///
/// ```
/// use findfoci::remap::IdRemap;
///
/// let mut remap = IdRemap::new(3);
/// remap.merge(3, 2);
/// remap.merge(2, 1);
/// assert_eq!(remap.resolve(3), 1);
/// assert!(!remap.is_live(2));
///
/// let mut labels = vec![0, 1, 2, 3];
/// remap.apply(&mut labels);
/// assert_eq!(labels, vec![0, 1, 1, 1]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct IdRemap {
    map: Vec<u32>,
    members: Vec<Vec<u32>>,
}

impl IdRemap {
    /// Create the identity table for ids `1..=max_id`.
    pub fn new(max_id: u32) -> Self {
        let n = max_id as usize + 1;
        Self {
            map: (0..n as u32).collect(),
            members: (0..n as u32).map(|id| vec![id]).collect(),
        }
    }

    /// Largest id of the table.
    pub fn max_id(&self) -> u32 {
        (self.map.len() - 1) as u32
    }

    /// The live id an id currently maps to.
    pub fn resolve(&self, id: u32) -> u32 {
        let mut id = id;
        loop {
            let next = self.map[id as usize];
            if next == id {
                return id;
            }
            id = next;
        }
    }

    /// Whether an id still names a peak.
    pub fn is_live(&self, id: u32) -> bool {
        id != 0 && self.map[id as usize] == id
    }

    /// Remap every id currently pointing at `from` to `to`.
    pub fn merge(&mut self, from: u32, to: u32) {
        if from == to || from == 0 {
            return;
        }
        let moved = std::mem::take(&mut self.members[from as usize]);
        for &m in &moved {
            self.map[m as usize] = to;
        }
        self.members[to as usize].extend(moved);
    }

    /// Remap every id currently pointing at `id` to the background.
    pub fn dissolve(&mut self, id: u32) {
        self.merge(id, 0);
    }

    /// Rewrite a label buffer through the table.
    pub fn apply(&self, labels: &mut [u32]) {
        for label in labels.iter_mut() {
            if *label != 0 {
                *label = self.map[*label as usize];
            }
        }
    }
}
