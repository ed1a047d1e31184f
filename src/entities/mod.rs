pub mod procedimiento;
pub mod ticket;
