//! Seeding a store from a JSON pet list

use std::path::Path;

use tamago_core::{Pet, TamagoError, TamagoResult};
use tamago_store::ObjectStore;

/// Parse a JSON array of pet records
pub fn parse_pets(raw: &str) -> TamagoResult<Vec<Pet>> {
    let pets: Vec<Pet> =
        serde_json::from_str(raw).map_err(|e| TamagoError::InvalidRecord(e.to_string()))?;
    for pet in &pets {
        pet.validate()?;
    }
    Ok(pets)
}

/// Create every pet listed in the file at `path`, returning how many were created
pub async fn seed_from_file<S: ObjectStore>(store: &S, path: &Path) -> TamagoResult<usize> {
    let raw = std::fs::read_to_string(path)?;
    let pets = parse_pets(&raw)?;
    let count = pets.len();
    for pet in pets {
        let key = pet.key.clone();
        store.create(pet).await?;
        tracing::debug!(key = %key, "seeded");
    }
    tracing::info!(pets = count, path = %path.display(), "store seeded");
    Ok(count)
}
