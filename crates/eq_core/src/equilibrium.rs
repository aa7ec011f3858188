//! Pure equilibrium math: K(T), Q(concentrations), shift, and the balanced
//! round-start split. Nothing here holds state.

use serde::{Deserialize, Serialize};

use crate::{Concentrations, Goal, ReactionDef, SpeciesId};

/// J/(mol·K).
pub const GAS_CONSTANT: f64 = 8.314;
/// Floor applied to missing or non-positive concentrations before exponentiation.
pub const CONCENTRATION_EPSILON: f64 = 1e-30;
/// exp(690) ≈ 1e300, the largest log-ratio that stays finite.
pub const MAX_LN_RATIO: f64 = 690.0;
pub const MIN_K: f64 = 1e-300;
pub const MAX_K: f64 = 1e300;
/// |ln(Q/K)| below this is rounding noise and counts as exact equilibrium.
pub const EQUILIBRIUM_TOLERANCE: f64 = 1e-9;

/// Natural log of Q = Π[products]^ν / Π[reactants]^ν.
pub fn ln_reaction_quotient(def: &ReactionDef, concentrations: &Concentrations) -> f64 {
    let ln_side = |side: &[SpeciesId]| -> f64 {
        side.iter()
            .map(|species| {
                let c = concentrations
                    .get(species)
                    .copied()
                    .filter(|c| c.is_finite() && *c > 0.0)
                    .unwrap_or(CONCENTRATION_EPSILON)
                    .max(CONCENTRATION_EPSILON);
                def.coefficient(species) * c.ln()
            })
            .sum()
    };
    ln_side(&def.products) - ln_side(&def.reactants)
}

/// Reaction quotient. Computed in log space so large coefficients cannot
/// overflow the intermediate products; the result is always finite and positive.
pub fn reaction_quotient(def: &ReactionDef, concentrations: &Concentrations) -> f64 {
    let ln_q = ln_reaction_quotient(def, concentrations).clamp(-MAX_LN_RATIO, MAX_LN_RATIO);
    ln_q.exp().clamp(MIN_K, MAX_K)
}

/// van't Hoff: ln(K/K₀) = −(ΔH·1000/R)·(1/T − 1/T₀)·sensitivity.
pub fn equilibrium_constant(def: &ReactionDef, temperature_k: f64) -> f64 {
    let k0 = if def.equilibrium_constant.is_finite() && def.equilibrium_constant > 0.0 {
        def.equilibrium_constant
    } else {
        1.0
    };
    let sensitivity = if def.temperature_sensitivity.is_finite() {
        def.temperature_sensitivity
    } else {
        1.0
    };
    let t0 = positive_or(def.reference_temperature(), crate::types::default_temperature());
    let t = positive_or(temperature_k, t0);

    let ln_ratio = -(def.delta_h_kj_per_mol * 1000.0 / GAS_CONSTANT) * (1.0 / t - 1.0 / t0)
        * sensitivity;
    let ln_ratio = if ln_ratio.is_finite() {
        ln_ratio.clamp(-MAX_LN_RATIO, MAX_LN_RATIO)
    } else {
        0.0
    };

    let k = k0 * ln_ratio.exp();
    if k.is_finite() {
        k.clamp(MIN_K, MAX_K)
    } else if ln_ratio > 0.0 {
        MAX_K
    } else {
        MIN_K
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// Signed displacement from equilibrium in (−1, 1).
///
/// Positive when Q < K (the system is driven toward products).
pub fn shift(k: f64, q: f64) -> f64 {
    if k == 0.0 || q == 0.0 || !k.is_finite() || !q.is_finite() {
        return 0.0;
    }
    let ln_ratio = (q / k).ln();
    if ln_ratio.is_nan() || ln_ratio.abs() < EQUILIBRIUM_TOLERANCE {
        return 0.0;
    }
    -ln_ratio.tanh()
}

/// Concentrations at which Q equals K(T) exactly.
///
/// The log of K is split symmetrically across the reactant and product
/// coefficient totals: products get 10^a and reactants 10^−a with
/// a = log10 K / (ΣνP + ΣνR). Species listed only in `initial_concentrations`
/// keep their authored value. Falls back to the authored concentrations when
/// either side is empty.
pub fn balanced_concentrations(def: &ReactionDef, temperature_k: f64) -> Concentrations {
    let mut out: Concentrations = def
        .initial_concentrations
        .iter()
        .map(|(species, &c)| (species.clone(), if c.is_finite() && c > 0.0 { c } else { 1.0 }))
        .collect();

    let reactant_total: f64 = def.reactants.iter().map(|s| def.coefficient(s)).sum();
    let product_total: f64 = def.products.iter().map(|s| def.coefficient(s)).sum();

    if reactant_total <= 0.0 || product_total <= 0.0 {
        for species in def.species() {
            out.entry(species.clone()).or_insert(1.0);
        }
        return out;
    }

    let k = equilibrium_constant(def, temperature_k);
    let a = k.log10() / (reactant_total + product_total);
    let product_c = 10f64.powf(a);
    let reactant_c = 10f64.powf(-a);

    for species in &def.reactants {
        out.insert(species.clone(), reactant_c);
    }
    for species in &def.products {
        out.insert(species.clone(), product_c);
    }
    out
}

/// How far `shift` has moved toward `goal`, in percent.
pub fn goal_progress(shift: f64, goal: Goal) -> f64 {
    match goal {
        Goal::Forward => (shift + 1.0) / 2.0 * 100.0,
        Goal::Reverse => (1.0 - shift) / 2.0 * 100.0,
    }
}

/// Direction a parameter change pushes the equilibrium, with a rough magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectAnalysis {
    /// Direction favoured by increasing the parameter. `None` when it has no effect.
    pub favours_on_increase: Option<Goal>,
    pub magnitude: f64,
}

/// Heating favours products for endothermic reactions.
pub fn temperature_effect(def: &ReactionDef) -> EffectAnalysis {
    let dh = def.delta_h_kj_per_mol;
    EffectAnalysis {
        favours_on_increase: Goal::of_shift(dh),
        magnitude: dh.abs() / 100.0,
    }
}

/// Raising pressure favours the side with fewer gas moles.
pub fn pressure_effect(def: &ReactionDef) -> EffectAnalysis {
    if !def.is_gas_phase() {
        return EffectAnalysis {
            favours_on_increase: None,
            magnitude: 0.0,
        };
    }
    let gas_moles = |side: &[SpeciesId]| -> f64 {
        side.iter()
            .filter(|s| def.gas_species.contains(s))
            .map(|s| def.coefficient(s))
            .sum()
    };
    let delta_n = gas_moles(&def.products) - gas_moles(&def.reactants);
    EffectAnalysis {
        favours_on_increase: Goal::of_shift(-delta_n),
        magnitude: delta_n.abs(),
    }
}
