//! Static catalog describing every target variant that can appear in a session.

use serde::{Deserialize, Serialize};

const POSITIVE_VARIANT_COUNT: usize = 15;
const PENALTY_POINT_VALUE: i32 = -20;

const POSITIVE_VARIANTS: [TargetVariant; POSITIVE_VARIANT_COUNT] = positive_variants();
const PENALTY_VARIANT: TargetVariant = TargetVariant {
    id: VariantId::new(POSITIVE_VARIANT_COUNT as u8 + 1),
    point_value: PENALTY_POINT_VALUE,
    is_penalty: true,
};

/// Identifier of a catalog-defined target variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantId(u8);

impl VariantId {
    /// Creates a new variant identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Immutable description of a target kind and the points it is worth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetVariant {
    id: VariantId,
    point_value: i32,
    is_penalty: bool,
}

impl TargetVariant {
    /// Identifier of the variant within the catalog.
    #[must_use]
    pub const fn id(&self) -> VariantId {
        self.id
    }

    /// Points awarded (or deducted) before the combo multiplier is applied.
    #[must_use]
    pub const fn point_value(&self) -> i32 {
        self.point_value
    }

    /// Reports whether tapping the variant triggers the penalty explosion.
    #[must_use]
    pub const fn is_penalty(&self) -> bool {
        self.is_penalty
    }
}

/// Stateless lookup over the fifteen scoring variants and the single penalty variant.
#[derive(Clone, Copy, Debug, Default)]
pub struct TargetCatalog;

impl TargetCatalog {
    /// Scoring variants ordered by point value, worth 1 through 15 points.
    #[must_use]
    pub const fn positive() -> &'static [TargetVariant] {
        &POSITIVE_VARIANTS
    }

    /// The "bad ball" variant that clears the board when tapped.
    #[must_use]
    pub const fn penalty() -> TargetVariant {
        PENALTY_VARIANT
    }

    /// Resolves a variant by identifier.
    #[must_use]
    pub fn variant(id: VariantId) -> Option<TargetVariant> {
        Self::iter().find(|variant| variant.id == id)
    }

    /// Iterates over every variant, scoring variants first.
    pub fn iter() -> impl Iterator<Item = TargetVariant> {
        POSITIVE_VARIANTS
            .into_iter()
            .chain(std::iter::once(PENALTY_VARIANT))
    }
}

const fn positive_variants() -> [TargetVariant; POSITIVE_VARIANT_COUNT] {
    let mut variants = [PENALTY_VARIANT; POSITIVE_VARIANT_COUNT];
    let mut index = 0;
    while index < POSITIVE_VARIANT_COUNT {
        let ordinal = index as u8 + 1;
        variants[index] = TargetVariant {
            id: VariantId::new(ordinal),
            point_value: ordinal as i32,
            is_penalty: false,
        };
        index += 1;
    }
    variants
}
