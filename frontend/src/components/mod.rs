pub mod alerts_panel;
pub mod dashboard;
pub mod detail_chart;
pub mod scanner_tab;
pub mod sidebar;
