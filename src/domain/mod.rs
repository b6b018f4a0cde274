//! Domain types for quote calculation.
//!
//! This module provides:
//! - Exact decimal arithmetic via the Decimal wrapper
//! - Quote inputs with permissive numeric parsing at the boundary
//! - The per-sheet quote result types and their display rounding
//! - Content digests for caching and revision diffing

pub mod decimal;
pub mod error;
pub mod fingerprint;
pub mod inputs;
pub mod lenient;
pub mod result;

pub use decimal::{Decimal, Overflow};
pub use error::QuoteError;
pub use fingerprint::digest_json;
pub use inputs::{
    AdditionalMode, CustomsLine, CustomsLineType, InstallLineItem, InsuranceProfitMode,
    QuoteInputs, SaleLineItem, DEFAULT_VENDOR_PROFIT_PCT,
};
pub use result::{
    anchor_line, Despacho, DespachoLine, DespachoRates, DespachoTotals, Financiacion, FinanciacionBase,
    FinanciacionParams, FinanciacionTotals, FinancingComponent, Instalacion, InstalacionLine,
    InstalacionTotals, Oferta, OfertaLine, OfertaTotals, Operacion, OperacionTotals,
    ProfitDistribution, QuoteResult, Rubro, RubroLine,
};
