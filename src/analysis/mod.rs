/// Hysteresis loop analysis: branch splitting and parameter fits.
///
/// ```text
///   Trace (E, D in file order)
///        │
///        ▼
///   ┌──────────┐
///   │  split    │  group by rounded E → upper (max D) / lower (min D)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   fit     │  lower near D = 0 → Ec,  upper on [Ec, max E] → slope, Ps
///   └──────────┘
/// ```

pub mod fit;
pub mod split;
