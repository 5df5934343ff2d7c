use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::Path,
};

use crate::{
    error::{MfErr, Result},
    matrix::SparseInteractionMatrix,
};

/// A single user-item interaction as found in a ratings file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub user: u64,
    pub item: u64,
    pub value: f32,
    pub timestamp: Option<i64>,
}

/// Reads a ratings CSV file, see `parse_ratings` for the format.
///
/// # Arguments
/// * `path` - The location of the file.
///
/// # Returns
/// The ratings in file order, or an error if the file can't be read or parsed.
pub fn read_ratings<P: AsRef<Path>>(path: P) -> Result<Vec<Rating>> {
    let content = fs::read_to_string(path)?;
    parse_ratings(&content)
}

/// Parses ratings in `user,item,rating[,timestamp]` CSV format.
///
/// The first line is a header and is skipped, as are blank lines.
///
/// # Returns
/// The ratings in order, or a `MfErr::Parse` with the 1-based line of the first bad record.
pub fn parse_ratings(content: &str) -> Result<Vec<Rating>> {
    let mut ratings = Vec::new();

    for (idx, line) in content.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parse_err = |reason: String| MfErr::Parse {
            line: idx + 1,
            reason,
        };

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(parse_err(format!(
                "expected 3 or 4 fields (user,item,rating[,timestamp]), got {}",
                fields.len()
            )));
        }

        let user = fields[0]
            .parse()
            .map_err(|_| parse_err(format!("cannot parse user id '{}'", fields[0])))?;
        let item = fields[1]
            .parse()
            .map_err(|_| parse_err(format!("cannot parse item id '{}'", fields[1])))?;
        let value: f32 = fields[2]
            .parse()
            .map_err(|_| parse_err(format!("cannot parse rating '{}'", fields[2])))?;

        if !value.is_finite() {
            return Err(parse_err(format!("rating '{}' is not finite", fields[2])));
        }

        let timestamp = match fields.get(3) {
            Some(ts) => Some(
                ts.parse()
                    .map_err(|_| parse_err(format!("cannot parse timestamp '{ts}'")))?,
            ),
            None => None,
        };

        ratings.push(Rating {
            user,
            item,
            value,
            timestamp,
        });
    }

    Ok(ratings)
}

/// A dense numbering of raw ids, in ascending raw id order.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    ids: Vec<u64>,
    index: HashMap<u64, usize>,
}

impl IdMap {
    /// Creates a new `IdMap` out of every distinct id in `ids`.
    pub fn from_ids<I: IntoIterator<Item = u64>>(ids: I) -> Self {
        let ids: Vec<u64> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let index = ids.iter().enumerate().map(|(idx, &id)| (id, idx)).collect();

        Self { ids, index }
    }

    /// Numbers the users of `ratings`.
    pub fn users(ratings: &[Rating]) -> Self {
        Self::from_ids(ratings.iter().map(|r| r.user))
    }

    /// Numbers the items of `ratings`.
    pub fn items(ratings: &[Rating]) -> Self {
        Self::from_ids(ratings.iter().map(|r| r.item))
    }

    pub fn get(&self, id: u64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// The raw id behind dense index `idx`.
    pub fn raw(&self, idx: usize) -> Option<u64> {
        self.ids.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Builds the interaction matrix of `ratings`.
///
/// Maps built over the complete dataset keep train and test matrices of a split
/// aligned on the same rows and columns.
///
/// # Arguments
/// * `ratings` - The interactions.
/// * `users` - The numbering of the rows.
/// * `items` - The numbering of the columns.
/// * `implicit` - Whether to drop the rating values.
///
/// # Returns
/// The matrix or a `MfErr::Construction` if a rating refers to an unmapped id.
pub fn to_matrix(
    ratings: &[Rating],
    users: &IdMap,
    items: &IdMap,
    implicit: bool,
) -> Result<SparseInteractionMatrix> {
    let triplets = ratings
        .iter()
        .map(|r| {
            let u = users
                .get(r.user)
                .ok_or_else(|| MfErr::construction(format!("unknown user id {}", r.user)))?;
            let i = items
                .get(r.item)
                .ok_or_else(|| MfErr::construction(format!("unknown item id {}", r.item)))?;

            Ok((u, i, r.value))
        })
        .collect::<Result<Vec<_>>>()?;

    SparseInteractionMatrix::from_triplets(users.len(), items.len(), &triplets, implicit)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "userId,movieId,rating,timestamp\n\
                       1,31,2.5,1260759144\n\
                       1,1029,3.0,1260759179\n\
                       \n\
                       7,31,4.0,1260759182\n";

    #[test]
    fn parse_with_header_and_blank_lines() {
        let ratings = parse_ratings(CSV).unwrap();

        assert_eq!(ratings.len(), 3);
        assert_eq!(
            ratings[0],
            Rating {
                user: 1,
                item: 31,
                value: 2.5,
                timestamp: Some(1260759144),
            }
        );
    }

    #[test]
    fn timestamp_is_optional() {
        let ratings = parse_ratings("user,item,rating\n3,4,5\n").unwrap();
        assert_eq!(ratings[0].timestamp, None);
    }

    #[test]
    fn errors_point_at_the_line() {
        let res = parse_ratings("user,item,rating\n1,2,3\n1,x,3\n");
        assert!(matches!(res, Err(MfErr::Parse { line: 3, .. })));

        let res = parse_ratings("user,item,rating\n1,2\n");
        assert!(matches!(res, Err(MfErr::Parse { line: 2, .. })));

        let res = parse_ratings("user,item,rating\n1,2,NaN\n");
        assert!(matches!(res, Err(MfErr::Parse { line: 2, .. })));
    }

    #[test]
    fn id_maps_are_dense_and_sorted() {
        let map = IdMap::from_ids([40, 7, 40, 12]);

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(7), Some(0));
        assert_eq!(map.get(12), Some(1));
        assert_eq!(map.get(40), Some(2));
        assert_eq!(map.get(1), None);
        assert_eq!(map.raw(2), Some(40));
    }

    #[test]
    fn matrix_from_ratings() {
        let ratings = parse_ratings(CSV).unwrap();
        let users = IdMap::users(&ratings);
        let items = IdMap::items(&ratings);

        let explicit = to_matrix(&ratings, &users, &items, false).unwrap();
        assert_eq!((explicit.n_rows(), explicit.n_cols(), explicit.nnz()), (2, 2, 3));
        assert_eq!(explicit.row(0), [0, 1]);
        assert_eq!(explicit.target(2), 4.);

        let implicit = to_matrix(&ratings, &users, &items, true).unwrap();
        assert!(implicit.is_implicit());

        let others = IdMap::from_ids([1]);
        assert!(to_matrix(&ratings, &others, &items, true).is_err());
    }
}
