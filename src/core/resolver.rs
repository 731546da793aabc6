use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{LikeRow, LikedPet};

/// A mutual-like pair, before user records are attached.
#[derive(Debug, Clone)]
pub struct ResolvedMatch {
    pub other_user_id: i64,
    /// The other user's pets that the caller liked.
    pub my_liked_pets: Vec<LikedPet>,
    /// The caller's pets that the other user liked.
    pub their_liked_pets: Vec<LikedPet>,
    /// Most recent `created_at` across both sides' like records.
    pub creation_time: DateTime<Utc>,
}

/// Resolve mutual matches for one caller from positive ledger rows.
///
/// `likes` is every rating-1 row where the caller is either the rater or
/// the owner of the rated pet. Likes the caller made are grouped by the
/// liked pet's owner, likes received are grouped by rater, and a match
/// is any user appearing in both groups. Each like record contributes
/// one evidence entry, so a pet rated at several versions shows up once
/// per rated version. Matches are user-level: any reciprocal like
/// between the two users' pet sets counts as one match.
///
/// Results are ordered newest match first.
pub fn resolve(caller_id: i64, my_pet_ids: &[i64], likes: &[LikeRow]) -> Vec<ResolvedMatch> {
    let my_pets: HashSet<i64> = my_pet_ids.iter().copied().collect();

    let mut liked_owners: BTreeMap<i64, Vec<&LikeRow>> = BTreeMap::new();
    let mut raters: BTreeMap<i64, Vec<&LikeRow>> = BTreeMap::new();

    for row in likes {
        if row.rater_id == caller_id {
            liked_owners.entry(row.pet_owner_id).or_default().push(row);
        }
        if my_pets.contains(&row.pet_id) {
            raters.entry(row.rater_id).or_default().push(row);
        }
    }

    let mut matches: Vec<ResolvedMatch> = liked_owners
        .iter()
        .filter(|(other_id, _)| **other_id != caller_id)
        .filter_map(|(other_id, mine)| {
            let theirs = raters.get(other_id)?;
            let creation_time = mine
                .iter()
                .chain(theirs.iter())
                .map(|row| row.created_at)
                .max()?;

            Some(ResolvedMatch {
                other_user_id: *other_id,
                my_liked_pets: mine.iter().map(|row| liked_pet(row)).collect(),
                their_liked_pets: theirs.iter().map(|row| liked_pet(row)).collect(),
                creation_time,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
    matches
}

fn liked_pet(row: &LikeRow) -> LikedPet {
    LikedPet {
        id: row.pet_id,
        name: row.pet_name.clone(),
        owner_id: row.pet_owner_id,
        description: row.pet_description.clone(),
        profile_image_id: row.profile_image_id,
        profile_image_url: row.profile_image_url.clone(),
    }
}
