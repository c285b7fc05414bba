use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum SpeciesType {
    Mammal,
    Bird,
    Reptile,
    Amphibian,
    Fish,
}

impl SpeciesType {
    pub const ALL: [SpeciesType; 5] = [
        Self::Mammal,
        Self::Bird,
        Self::Reptile,
        Self::Amphibian,
        Self::Fish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mammal => "Mammal",
            Self::Bird => "Bird",
            Self::Reptile => "Reptile",
            Self::Amphibian => "Amphibian",
            Self::Fish => "Fish",
        }
    }
}

/// One provisionally extracted species record.
///
/// `family` and `distribution` are carried through the index empty; later
/// stages fill them. `wiki_path` is the join key against the archive and is
/// always of the form `/wiki/<slug>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpeciesCandidate {
    pub name: String,
    pub latin: String,
    #[serde(default)]
    pub family: String,
    #[serde(rename = "type")]
    pub kind: SpeciesType,
    #[serde(default)]
    pub distribution: String,
    pub wiki_path: String,
}

impl SpeciesCandidate {
    pub fn new(
        kind: SpeciesType,
        name: impl Into<String>,
        latin: impl Into<String>,
        wiki_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            latin: latin.into(),
            family: String::new(),
            kind,
            distribution: String::new(),
            wiki_path: wiki_path.into(),
        }
    }

    /// Case-insensitive identity used by every dedup stage.
    pub fn path_key(&self) -> String {
        self.wiki_path.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::{SpeciesCandidate, SpeciesType};

    #[test]
    fn serializes_with_downstream_field_names_in_order() {
        let candidate = SpeciesCandidate::new(
            SpeciesType::Mammal,
            "White-tailed deer",
            "O. virginianus",
            "/wiki/Odocoileus_virginianus",
        );
        let json = serde_json::to_string(&candidate).expect("serialize");
        assert_eq!(
            json,
            r#"{"name":"White-tailed deer","latin":"O. virginianus","family":"","type":"Mammal","distribution":"","wiki_path":"/wiki/Odocoileus_virginianus"}"#
        );
    }

    #[test]
    fn deserializes_records_without_reserved_fields() {
        let candidate: SpeciesCandidate = serde_json::from_str(
            r#"{"name":"Elk","latin":"Cervus canadensis","type":"Mammal","wiki_path":"/wiki/Elk"}"#,
        )
        .expect("deserialize");
        assert_eq!(candidate.kind, SpeciesType::Mammal);
        assert!(candidate.family.is_empty());
        assert_eq!(candidate.path_key(), "/wiki/elk");
    }
}
