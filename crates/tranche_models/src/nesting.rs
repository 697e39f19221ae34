//! CDO² structure: sub-baskets and the cross-subordination level transform.
//!
//! Without cross-subordination each sub-basket tranches its own losses and
//! the outer loss is the sum of the sub-tranche losses. With
//! cross-subordination every sub-basket's attachment drops to zero, losses
//! are capped at each detachment and the combined subordination
//! `Σ P_k a_k` is deducted once from the sum. Levels of the outer tranche
//! are then mapped into the coordinate `S = Σ min(L_k, P_k d_k) / Σ P_k d_k`
//! by [`LevelTransform`].

use crate::error::BasketError;

/// One inner tranche of a CDO².
#[derive(Debug, Clone, PartialEq)]
pub struct SubBasket {
    /// Principal of each pool name in this sub-basket; zero means absent.
    pub principals: Vec<f64>,
    /// Attachment as a fraction of the sub-basket principal.
    pub attachment: f64,
    /// Detachment as a fraction of the sub-basket principal.
    pub detachment: f64,
}

impl SubBasket {
    /// Builds a sub-basket.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` unless `0 ≤ attachment ≤ detachment ≤ 1`,
    /// `BasketError::Configuration` for a negative principal or an empty
    /// sub-basket.
    pub fn new(principals: Vec<f64>, attachment: f64, detachment: f64) -> Result<Self, BasketError> {
        if attachment > detachment {
            return Err(BasketError::inverted_tranche());
        }
        if attachment < 0.0 || detachment > 1.0 {
            return Err(BasketError::InvalidArgument(format!(
                "sub-basket tranche [{}, {}] outside [0, 1]",
                attachment, detachment
            )));
        }
        if principals.iter().any(|p| !(*p >= 0.0)) {
            return Err(BasketError::Configuration(
                "sub-basket principals must be non-negative".into(),
            ));
        }
        if principals.iter().all(|&p| p == 0.0) {
            return Err(BasketError::Configuration("sub-basket has no names".into()));
        }
        Ok(Self {
            principals,
            attachment,
            detachment,
        })
    }

    /// Sum of principals.
    pub fn total_principal(&self) -> f64 {
        self.principals.iter().sum()
    }

    /// Tranche notional `P (d - a)`.
    pub fn notional(&self) -> f64 {
        self.total_principal() * (self.detachment - self.attachment)
    }

    /// True when the tranche covers the whole sub-basket.
    pub fn is_full_range(&self) -> bool {
        self.attachment <= 0.0 && self.detachment >= 1.0
    }

    /// True if name `i` belongs to this sub-basket.
    pub fn contains(&self, i: usize) -> bool {
        self.principals.get(i).is_some_and(|&p| p > 0.0)
    }

    /// Tranche loss amount for a sub-basket loss amount.
    pub fn tranche_loss(&self, basket_loss: f64, cross_subordination: bool) -> f64 {
        let total = self.total_principal();
        let cap = total * self.detachment;
        if cross_subordination {
            basket_loss.min(cap)
        } else {
            (basket_loss - total * self.attachment).clamp(0.0, cap - total * self.attachment)
        }
    }
}

/// Mapping between outer tranche levels and surface levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelTransform {
    /// Surface level of zero outer loss.
    pub base_level: f64,
    /// Surface level per unit of outer level.
    pub scale_factor: f64,
}

impl Default for LevelTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl LevelTransform {
    /// The identity mapping.
    pub fn identity() -> Self {
        Self {
            base_level: 0.0,
            scale_factor: 1.0,
        }
    }

    /// True for the identity mapping.
    pub fn is_identity(&self) -> bool {
        self.base_level == 0.0 && self.scale_factor == 1.0
    }

    /// Outer level to surface level, capped at 1.
    pub fn forward(&self, level: f64) -> f64 {
        (self.base_level + self.scale_factor * level).min(1.0)
    }

    /// Surface level to outer level.
    pub fn inverse(&self, surface_level: f64) -> f64 {
        (surface_level - self.base_level) / self.scale_factor
    }
}

/// Sub-baskets of a CDO² over one shared pool.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedStructure {
    sub_baskets: Vec<SubBasket>,
    cross_subordination: bool,
}

impl NestedStructure {
    /// Builds the structure.
    ///
    /// # Errors
    /// `BasketError::Configuration` if there are no sub-baskets or their
    /// principal arrays differ in length.
    pub fn new(sub_baskets: Vec<SubBasket>, cross_subordination: bool) -> Result<Self, BasketError> {
        let n = sub_baskets.first().map(|s| s.principals.len()).ok_or_else(|| {
            BasketError::Configuration("nested structure has no sub-baskets".into())
        })?;
        if sub_baskets.iter().any(|s| s.principals.len() != n) {
            return Err(BasketError::Configuration(
                "sub-basket principal arrays differ in length".into(),
            ));
        }
        Ok(Self {
            sub_baskets,
            cross_subordination,
        })
    }

    /// Sub-baskets.
    pub fn sub_baskets(&self) -> &[SubBasket] {
        &self.sub_baskets
    }

    /// Whether cross-subordination applies.
    pub fn cross_subordination(&self) -> bool {
        self.cross_subordination
    }

    /// Number of pool names each sub-basket spans.
    pub fn n_names(&self) -> usize {
        self.sub_baskets[0].principals.len()
    }

    /// Sum of sub-tranche notionals: the outer pool size.
    pub fn total_principal(&self) -> f64 {
        self.sub_baskets.iter().map(SubBasket::notional).sum()
    }

    /// Level transform for an outer pool of `total_principal`.
    ///
    /// Identity without cross-subordination.
    pub fn level_transform(&self, total_principal: f64) -> LevelTransform {
        if !self.cross_subordination {
            return LevelTransform::identity();
        }
        let new_total: f64 = self
            .sub_baskets
            .iter()
            .map(|s| s.total_principal() * s.detachment)
            .sum();
        let deduct: f64 = self
            .sub_baskets
            .iter()
            .map(|s| s.total_principal() * s.attachment)
            .sum();
        if new_total <= 0.0 {
            return LevelTransform::identity();
        }
        LevelTransform {
            base_level: deduct / new_total,
            scale_factor: total_principal / new_total,
        }
    }

    /// Outer loss on the surface scale for per-sub-basket loss amounts.
    ///
    /// With cross-subordination this is `S`, otherwise the outer loss
    /// fraction. Either way it lies in [0, 1].
    pub fn surface_loss(&self, basket_losses: &[f64]) -> f64 {
        let capped: f64 = self
            .sub_baskets
            .iter()
            .zip(basket_losses)
            .map(|(s, &l)| s.tranche_loss(l, self.cross_subordination))
            .sum();
        let denom = if self.cross_subordination {
            self.sub_baskets
                .iter()
                .map(|s| s.total_principal() * s.detachment)
                .sum()
        } else {
            self.total_principal()
        };
        if denom > 0.0 {
            (capped / denom).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Correlation per pool name from per-sub-basket correlations: the mean
    /// over the sub-baskets containing the name, 0 for names in none.
    ///
    /// For a pair of sub-baskets this is the `(ρ_i + ρ_j) / 2` rule applied
    /// to names in their intersection. It is an approximation, not derived
    /// from the joint dynamics.
    pub fn name_correlations(&self, basket_correlations: &[f64]) -> Vec<f64> {
        (0..self.n_names())
            .map(|i| {
                let (sum, count) = self
                    .sub_baskets
                    .iter()
                    .zip(basket_correlations)
                    .filter(|(s, _)| s.contains(i))
                    .fold((0.0, 0usize), |(sum, count), (_, &rho)| (sum + rho, count + 1));
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect()
    }
}
