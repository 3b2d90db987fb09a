// src/model/variables.rs

//! The static variable catalog.
//!
//! Every business quantity the engine knows about is listed once here with its
//! category, kind (which drives validation), and for inputs the documented
//! default and the human-readable aliases used to recognise questionnaire answers.
//! The table is immutable and shared by every run.

use serde::Serialize;

// Inputs
pub const DH: &str = "DH";
pub const PVP: &str = "PVP";
pub const CUIP: &str = "CUIP";
pub const SE: &str = "SE";
pub const CUA: &str = "CUA";
pub const CTL: &str = "CTL";
pub const GO: &str = "GO";
pub const CMIPF: &str = "CMIPF";
pub const CCT: &str = "CCT";
pub const CPROD: &str = "CPROD";
pub const NEPP: &str = "NEPP";
pub const MLP: &str = "MLP";
pub const TPE: &str = "TPE";
pub const CINSP: &str = "CINSP";
pub const QC: &str = "QC";
pub const TMP: &str = "TMP";
pub const TE: &str = "TE";
pub const IIMP: &str = "IIMP";
pub const IIPF: &str = "IIPF";
pub const NMD: &str = "NMD";

// Demand
pub const DPH: &str = "DPH";
pub const DSD: &str = "DSD";
pub const CVD: &str = "CVD";
pub const TDM: &str = "TDM";
pub const DDP: &str = "DDP";
pub const DE: &str = "DE";
pub const VPC: &str = "VPC";

// Production
pub const PTG: &str = "PTG";
pub const CPL: &str = "CPL";
pub const CPM: &str = "CPM";
pub const CPR: &str = "CPR";
pub const QPL: &str = "QPL";
pub const FU: &str = "FU";
pub const PE: &str = "PE";
pub const PPE: &str = "PPE";
pub const HTR: &str = "HTR";
pub const QGP: &str = "QGP";
pub const QDF: &str = "QDF";
pub const MPU: &str = "MPU";

// Sales
pub const TPV: &str = "TPV";
pub const DI: &str = "DI";
pub const NSC: &str = "NSC";
pub const TCS: &str = "TCS";
pub const NCM: &str = "NCM";
pub const STR: &str = "STR";

// Costs
pub const CTAI: &str = "CTAI";
pub const CMO: &str = "CMO";
pub const CTO: &str = "CTO";
pub const NVJ: &str = "NVJ";
pub const CTR: &str = "CTR";
pub const PSA: &str = "PSA";
pub const CAL: &str = "CAL";
pub const QMR: &str = "QMR";
pub const CMR: &str = "CMR";
pub const CTP: &str = "CTP";
pub const CUP: &str = "CUP";

// Revenue
pub const IT: &str = "IT";
pub const IE: &str = "IE";
pub const ILP: &str = "ILP";
pub const GB: &str = "GB";
pub const MB: &str = "MB";
pub const GN: &str = "GN";
pub const MN: &str = "MN";
pub const RSI: &str = "RSI";

// Inventory
pub const ZSC: &str = "ZSC";
pub const SSG: &str = "SSG";
pub const ITG: &str = "ITG";
pub const ROP: &str = "ROP";
pub const IPF: &str = "IPF";
pub const IMP: &str = "IMP";
pub const RMR: &str = "RMR";
pub const PRM: &str = "PRM";
pub const DCI: &str = "DCI";
pub const RTI: &str = "RTI";

// Composite indicators (resolved by the equation solver)
pub const RNT: &str = "RNT";
pub const IEF: &str = "IEF";
pub const EOG: &str = "EOG";
pub const IDG: &str = "IDG";
pub const ICP: &str = "ICP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Demand,
    Production,
    Sales,
    Costs,
    Revenue,
    Inventory,
    Composite,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Demand,
        Category::Production,
        Category::Sales,
        Category::Costs,
        Category::Revenue,
        Category::Inventory,
        Category::Composite,
    ];
}

/// How a value is validated and clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableKind {
    /// Fraction in [0, 1]; percentages above 1 are divided by 100 on input.
    Ratio,
    /// Fraction in [-1, 1] (margins).
    SignedRatio,
    /// Whole number, at least 1.
    Count,
    Money,
    Time,
    Quantity,
    /// Unbounded (profits, slopes, z-scores).
    Signed,
    /// The demand history.
    Series,
}

impl VariableKind {
    /// Inclusive range a value of this kind must lie in.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            VariableKind::Ratio => (0.0, 1.0),
            VariableKind::SignedRatio => (-1.0, 1.0),
            VariableKind::Count => (1.0, f64::INFINITY),
            VariableKind::Money | VariableKind::Time | VariableKind::Quantity => {
                (0.0, f64::INFINITY)
            }
            VariableKind::Signed | VariableKind::Series => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VariableSpec {
    pub code: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub kind: VariableKind,
    pub input: bool,
    pub default: Option<f64>,
    pub ceiling: Option<f64>,
    pub aliases: &'static [&'static str],
}

impl VariableSpec {
    const fn input(
        code: &'static str,
        name: &'static str,
        category: Category,
        kind: VariableKind,
        default: Option<f64>,
        aliases: &'static [&'static str],
    ) -> Self {
        Self {
            code,
            name,
            category,
            kind,
            input: true,
            default,
            ceiling: None,
            aliases,
        }
    }

    const fn computed(
        code: &'static str,
        name: &'static str,
        category: Category,
        kind: VariableKind,
    ) -> Self {
        Self {
            code,
            name,
            category,
            kind,
            input: false,
            default: None,
            ceiling: None,
            aliases: &[],
        }
    }

    const fn ceiling(mut self, ceiling: f64) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Clamps `value` into the kind's range and the optional ceiling.
    pub fn clamp(&self, value: f64) -> f64 {
        let (lo, hi) = self.kind.bounds();
        let hi = match self.ceiling {
            Some(c) => hi.min(c),
            None => hi,
        };
        let v = if self.kind == VariableKind::Count {
            value.floor()
        } else {
            value
        };
        v.clamp(lo, hi)
    }
}

use Category::*;
use VariableKind::*;

/// Inputs are ordered so that more specific aliases are tried before generic ones.
pub static VARIABLES: &[VariableSpec] = &[
    VariableSpec::input(
        DH,
        "Historical daily demand",
        Demand,
        Series,
        None,
        &[
            "historical demand",
            "demand history",
            "demanda histórica",
            "demanda historica",
            "sales history",
            "past sales",
            "ventas históricas",
            "ventas historicas",
        ],
    ),
    VariableSpec::input(
        PVP,
        "Unit selling price",
        Revenue,
        Money,
        Some(15.0),
        &[
            "selling price",
            "sale price",
            "precio de venta",
            "unit price",
            "price per unit",
            "precio unitario",
        ],
    ),
    VariableSpec::input(
        CUIP,
        "Cost per unit of raw material",
        Costs,
        Money,
        Some(8.0),
        &[
            "raw material cost",
            "material cost",
            "input cost",
            "costo de insumo",
            "costo unitario de insumo",
            "costo de materia prima",
        ],
    ),
    VariableSpec::input(
        SE,
        "Daily wage per employee",
        Costs,
        Money,
        Some(80.0),
        &["wage", "salary", "salario", "sueldo"],
    ),
    VariableSpec::input(
        CUA,
        "Storage cost per unit per day",
        Inventory,
        Money,
        Some(0.02),
        &["storage cost", "holding cost", "costo de almacenamiento"],
    ),
    VariableSpec::input(
        CTL,
        "Transport cost per trip",
        Costs,
        Money,
        Some(120.0),
        &[
            "transport cost",
            "cost per trip",
            "shipping cost",
            "delivery cost",
            "costo de transporte",
        ],
    ),
    VariableSpec::input(
        GO,
        "Fixed operating cost per day",
        Costs,
        Money,
        Some(1500.0),
        &[
            "operating expenses",
            "operating cost",
            "fixed costs",
            "overhead",
            "gastos operativos",
            "costos fijos",
        ],
    ),
    VariableSpec::input(
        CMIPF,
        "Finished-goods warehouse capacity",
        Inventory,
        Quantity,
        Some(15000.0),
        &[
            "warehouse capacity",
            "storage capacity",
            "capacidad de almacenamiento",
            "capacidad del almacén",
            "capacidad del almacen",
        ],
    ),
    VariableSpec::input(
        CCT,
        "Units per transport trip",
        Sales,
        Quantity,
        Some(800.0),
        &[
            "units per trip",
            "truck capacity",
            "vehicle capacity",
            "capacidad de transporte",
            "capacidad del vehículo",
            "capacidad del vehiculo",
        ],
    ),
    VariableSpec::input(
        CPROD,
        "Equipment production capacity per day",
        Production,
        Quantity,
        Some(3000.0),
        &[
            "production capacity",
            "max production",
            "capacidad de producción",
            "capacidad de produccion",
        ],
    ),
    VariableSpec::input(
        NEPP,
        "Production staff",
        Production,
        Count,
        Some(10.0),
        &[
            "employees",
            "workers",
            "headcount",
            "staff",
            "empleados",
            "operarios",
            "trabajadores",
        ],
    ),
    VariableSpec::input(
        MLP,
        "Labour minutes per employee per day",
        Production,
        Time,
        Some(480.0),
        &[
            "minutes per day",
            "working minutes",
            "shift length",
            "minutos por día",
            "minutos por dia",
        ],
    )
    .ceiling(1440.0),
    VariableSpec::input(
        TPE,
        "Labour minutes per unit",
        Production,
        Time,
        Some(1.5),
        &[
            "minutes per unit",
            "time per unit",
            "production time",
            "tiempo por unidad",
            "tiempo de producción",
            "tiempo de produccion",
        ],
    ),
    VariableSpec::input(
        CINSP,
        "Raw-material units per product",
        Production,
        Quantity,
        Some(1.0),
        &[
            "materials per unit",
            "material per product",
            "inputs per product",
            "insumos por producto",
        ],
    ),
    VariableSpec::input(
        QC,
        "Quality rate",
        Production,
        Ratio,
        Some(0.95),
        &["quality", "defect-free", "first pass yield", "calidad"],
    ),
    VariableSpec::input(
        TMP,
        "Daily spoilage rate",
        Inventory,
        Ratio,
        Some(0.005),
        &["spoilage", "waste rate", "shrinkage", "merma"],
    ),
    VariableSpec::input(
        TE,
        "Supplier lead time in days",
        Inventory,
        Time,
        Some(3.0),
        &[
            "lead time",
            "supplier delivery",
            "days to deliver",
            "tiempo de entrega",
        ],
    )
    .ceiling(365.0),
    VariableSpec::input(
        IIMP,
        "Opening raw-material stock",
        Inventory,
        Quantity,
        Some(10000.0),
        &[
            "raw material inventory",
            "raw material stock",
            "inventario de materia prima",
            "inventario de insumos",
        ],
    ),
    VariableSpec::input(
        IIPF,
        "Opening finished-goods stock",
        Inventory,
        Quantity,
        Some(2500.0),
        &[
            "finished goods inventory",
            "initial inventory",
            "stock on hand",
            "inventario inicial",
            "producto terminado",
        ],
    ),
    VariableSpec::input(
        NMD,
        "Customers per day",
        Sales,
        Count,
        Some(120.0),
        &[
            "customers per day",
            "daily customers",
            "number of customers",
            "clientes por día",
            "clientes por dia",
        ],
    ),
    // Demand
    VariableSpec::computed(DPH, "Trailing mean demand", Demand, Quantity),
    VariableSpec::computed(DSD, "Trailing demand std-dev", Demand, Quantity),
    VariableSpec::computed(CVD, "Demand coefficient of variation", Demand, Quantity),
    VariableSpec::computed(TDM, "Short-term demand trend", Demand, Signed),
    VariableSpec::computed(DDP, "Projected demand", Demand, Quantity),
    VariableSpec::computed(DE, "Expected demand", Demand, Quantity),
    VariableSpec::computed(VPC, "Units per customer", Demand, Quantity),
    // Production
    VariableSpec::computed(PTG, "Production target", Production, Quantity),
    VariableSpec::computed(CPL, "Labour capacity", Production, Quantity),
    VariableSpec::computed(CPM, "Material capacity", Production, Quantity),
    VariableSpec::computed(CPR, "Effective capacity", Production, Quantity),
    VariableSpec::computed(QPL, "Units produced", Production, Quantity),
    VariableSpec::computed(FU, "Capacity utilization", Production, Ratio),
    VariableSpec::computed(PE, "Labour productivity", Production, Ratio),
    VariableSpec::computed(PPE, "Units per employee", Production, Quantity),
    VariableSpec::computed(HTR, "Labour hours worked", Production, Time),
    VariableSpec::computed(QGP, "Good units produced", Production, Quantity),
    VariableSpec::computed(QDF, "Defective units", Production, Quantity),
    VariableSpec::computed(MPU, "Raw material consumed", Production, Quantity),
    // Sales
    VariableSpec::computed(TPV, "Units sold", Sales, Quantity),
    VariableSpec::computed(DI, "Unmet demand", Sales, Quantity),
    VariableSpec::computed(NSC, "Service level", Sales, Ratio),
    VariableSpec::computed(TCS, "Customers served", Sales, Quantity),
    VariableSpec::computed(NCM, "Customers lost", Sales, Quantity),
    VariableSpec::computed(STR, "Sell-through rate", Sales, Ratio),
    // Costs
    VariableSpec::computed(CTAI, "Material cost", Costs, Money),
    VariableSpec::computed(CMO, "Labour cost", Costs, Money),
    VariableSpec::computed(CTO, "Operating cost", Costs, Money),
    VariableSpec::computed(NVJ, "Transport trips", Costs, Quantity),
    VariableSpec::computed(CTR, "Transport cost", Costs, Money),
    VariableSpec::computed(PSA, "Overstock penalty", Costs, Money),
    VariableSpec::computed(CAL, "Storage cost", Costs, Money),
    VariableSpec::computed(QMR, "Spoiled units", Costs, Quantity),
    VariableSpec::computed(CMR, "Spoilage cost", Costs, Money),
    VariableSpec::computed(CTP, "Total cost", Costs, Money),
    VariableSpec::computed(CUP, "Cost per unit produced", Costs, Money),
    // Revenue
    VariableSpec::computed(IT, "Actual revenue", Revenue, Money),
    VariableSpec::computed(IE, "Expected revenue", Revenue, Money),
    VariableSpec::computed(ILP, "Lost revenue", Revenue, Money),
    VariableSpec::computed(GB, "Gross margin", Revenue, Signed),
    VariableSpec::computed(MB, "Gross margin ratio", Revenue, SignedRatio),
    VariableSpec::computed(GN, "Net profit", Revenue, Signed),
    VariableSpec::computed(MN, "Net margin ratio", Revenue, SignedRatio),
    VariableSpec::computed(RSI, "Return on cost", Revenue, Signed),
    // Inventory
    VariableSpec::computed(ZSC, "Service z-factor", Inventory, Signed),
    VariableSpec::computed(SSG, "Safety stock", Inventory, Quantity),
    VariableSpec::computed(ITG, "Target stock", Inventory, Quantity),
    VariableSpec::computed(ROP, "Raw-material reorder point", Inventory, Quantity),
    VariableSpec::computed(IPF, "Finished-goods stock", Inventory, Quantity),
    VariableSpec::computed(IMP, "Raw-material stock", Inventory, Quantity),
    VariableSpec::computed(RMR, "Raw material received", Inventory, Quantity),
    VariableSpec::computed(PRM, "Raw material ordered", Inventory, Quantity),
    VariableSpec::computed(DCI, "Inventory coverage days", Inventory, Time),
    VariableSpec::computed(RTI, "Inventory turnover", Inventory, Quantity),
    // Composite
    VariableSpec::computed(RNT, "Profitability index", Composite, Ratio),
    VariableSpec::computed(IEF, "Inventory efficiency", Composite, Ratio),
    VariableSpec::computed(EOG, "Overall operational efficiency", Composite, Ratio),
    VariableSpec::computed(IDG, "Global performance index", Composite, Ratio),
    VariableSpec::computed(ICP, "Competitiveness index", Composite, Ratio),
];

/// Read-only view over a variable table, injected into the extractor and calculator.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    specs: &'static [VariableSpec],
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    pub fn standard() -> Self {
        Self { specs: VARIABLES }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static VariableSpec> {
        self.specs.iter()
    }

    pub fn spec(&self, code: &str) -> Option<&'static VariableSpec> {
        self.specs.iter().find(|s| s.code.eq_ignore_ascii_case(code))
    }

    pub fn inputs(&self) -> impl Iterator<Item = &'static VariableSpec> {
        self.specs.iter().filter(|s| s.input)
    }

    /// Every scalar code a complete day result is expected to carry.
    pub fn day_codes(&self) -> impl Iterator<Item = &'static str> {
        self.specs
            .iter()
            .filter(|s| s.kind != VariableKind::Series)
            .map(|s| s.code)
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &'static VariableSpec> {
        self.specs
            .iter()
            .filter(move |s| s.category == category && s.kind != VariableKind::Series)
    }

    /// First input whose alias occurs (case-insensitively) inside `label`.
    pub fn match_alias(&self, label: &str) -> Option<&'static VariableSpec> {
        let label = label.to_lowercase();
        self.inputs()
            .find(|spec| spec.aliases.iter().any(|alias| label.contains(alias)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let mut seen = HashSet::new();
        for spec in VARIABLES {
            assert!(seen.insert(spec.code), "duplicate code {}", spec.code);
        }
        assert!(VARIABLES.len() >= 75);
    }

    #[test]
    fn test_every_input_but_history_has_a_default() {
        for spec in Catalog::standard().inputs() {
            if spec.code == DH {
                assert!(spec.default.is_none());
            } else {
                assert!(spec.default.is_some(), "{} has no default", spec.code);
            }
        }
    }

    #[test]
    fn test_alias_matching_is_case_insensitive_and_ordered() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.match_alias("Unit SELLING PRICE ($)").unwrap().code, PVP);
        assert_eq!(catalog.match_alias("Daily wage per employee").unwrap().code, SE);
        assert_eq!(catalog.match_alias("Number of employees").unwrap().code, NEPP);
        assert_eq!(catalog.match_alias("Capacidad de producción diaria").unwrap().code, CPROD);
        assert!(catalog.match_alias("favourite colour").is_none());
    }

    #[test]
    fn test_clamp_respects_kind_and_ceiling() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.spec(MLP).unwrap().clamp(2000.0), 1440.0);
        assert_eq!(catalog.spec(NEPP).unwrap().clamp(0.3), 1.0);
        assert_eq!(catalog.spec(NEPP).unwrap().clamp(7.8), 7.0);
        assert_eq!(catalog.spec(QC).unwrap().clamp(1.2), 1.0);
        assert_eq!(catalog.spec(MN).unwrap().clamp(-3.0), -1.0);
        assert_eq!(catalog.spec(GN).unwrap().clamp(-3.0), -3.0);
    }
}
