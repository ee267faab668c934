//! Fixed board geometry: valid points, mills, adjacency and notation.
//!
//! The 24 playable points are the cells of a 7x7 grid that lie on one of the
//! three concentric squares or on the four connecting spokes. Points are
//! indexed in `x`-major scan order of the grid:
//!
//! ```text
//!      a    b    c    d    e    f    g
//! 7   [ 0]-----------[ 9]-----------[21]
//! 6    |   [ 3]------[10]------[18]  |
//! 5    |    |   [ 6]-[11]-[15]  |    |
//! 4   [ 1]-[ 4]-[ 7]      [16]-[19]-[22]
//! 3    |    |   [ 8]-[12]-[17]  |    |
//! 2    |   [ 5]------[13]------[20]  |
//! 1   [ 2]-----------[14]-----------[23]
//! ```
//!
//! `x` is the file (a..g) and `y` counts ranks from the top (rank 7 is `y = 0`).

/// Number of playable points.
pub const POINT_COUNT: usize = 24;

/// Side length of the underlying grid.
pub const GRID_SIZE: usize = 7;

/// Grid coordinates `(x, y)` of every playable point, in index order.
pub const POINTS: [(u8, u8); POINT_COUNT] = [
    (0, 0),
    (0, 3),
    (0, 6),
    (1, 1),
    (1, 3),
    (1, 5),
    (2, 2),
    (2, 3),
    (2, 4),
    (3, 0),
    (3, 1),
    (3, 2),
    (3, 4),
    (3, 5),
    (3, 6),
    (4, 2),
    (4, 3),
    (4, 4),
    (5, 1),
    (5, 3),
    (5, 5),
    (6, 0),
    (6, 3),
    (6, 6),
];

/// The 16 scoring lines.
pub const MILLS: [[usize; 3]; 16] = [
    // rank lines
    [0, 9, 21],
    [3, 10, 18],
    [6, 11, 15],
    [1, 4, 7],
    [16, 19, 22],
    [8, 12, 17],
    [5, 13, 20],
    [2, 14, 23],
    // file lines
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [9, 10, 11],
    [12, 13, 14],
    [15, 16, 17],
    [18, 19, 20],
    [21, 22, 23],
];

/// Neighbours of each point along the board lines.
pub const ADJACENT: [&[usize]; POINT_COUNT] = [
    &[1, 9],
    &[0, 2, 4],
    &[1, 14],
    &[4, 10],
    &[1, 3, 5, 7],
    &[4, 13],
    &[7, 11],
    &[4, 6, 8],
    &[7, 12],
    &[0, 10, 21],
    &[3, 9, 11, 18],
    &[6, 10, 15],
    &[8, 13, 17],
    &[5, 12, 14, 20],
    &[2, 13, 23],
    &[11, 16],
    &[15, 17, 19],
    &[12, 16],
    &[10, 19],
    &[16, 18, 20, 22],
    &[13, 19],
    &[9, 22],
    &[19, 21, 23],
    &[14, 22],
];

/// The two mills through each point.
pub const POINT_MILLS: [[usize; 2]; POINT_COUNT] = build_point_mills();

const fn build_point_mills() -> [[usize; 2]; POINT_COUNT] {
    let mut out = [[0usize; 2]; POINT_COUNT];
    let mut filled = [0usize; POINT_COUNT];
    let mut m = 0;
    while m < MILLS.len() {
        let mut k = 0;
        while k < 3 {
            let p = MILLS[m][k];
            out[p][filled[p]] = m;
            filled[p] += 1;
            k += 1;
        }
        m += 1;
    }
    out
}

/// Point index at grid coordinates, if that cell is playable.
pub fn point_at(x: u8, y: u8) -> Option<usize> {
    POINTS.iter().position(|&xy| xy == (x, y))
}

/// True when `a` and `b` are joined by a board line segment.
#[inline]
pub fn are_adjacent(a: usize, b: usize) -> bool {
    a < POINT_COUNT && ADJACENT[a].contains(&b)
}

/// Algebraic name of a point, e.g. `"d6"`.
pub fn point_name(point: usize) -> String {
    let (x, y) = POINTS[point];
    format!("{}{}", (b'a' + x) as char, GRID_SIZE as u8 - y)
}

/// Parse an algebraic point name. Accepts upper or lower case files.
pub fn parse_point(token: &str) -> Option<usize> {
    let bytes = token.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].to_ascii_lowercase();
    let rank = bytes[1];
    if !(b'a'..=b'g').contains(&file) || !(b'1'..=b'7').contains(&rank) {
        return None;
    }
    let x = file - b'a';
    let y = GRID_SIZE as u8 - (rank - b'0');
    point_at(x, y)
}
