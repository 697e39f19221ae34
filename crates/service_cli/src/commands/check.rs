//! Check command implementation
//!
//! Loads a portfolio and its options and reports what the engine would
//! build, without computing any surface.

use tracing::info;

use crate::config::Portfolio;
use crate::Result;

/// Run the check command
pub fn run(portfolio: &str, options: Option<&str>) -> Result<()> {
    let portfolio = Portfolio::load(portfolio, options)?;
    let setup = portfolio.setup()?;
    let tranches = portfolio.synthetic_tranches()?;
    // Fails early on strategy-specific configuration
    let basket = portfolio.basket()?;

    info!("Portfolio OK");
    println!("Strategy:        {}", basket.variant_name());
    println!("Names:           {}", setup.pool().len());
    println!("Total principal: {}", setup.pool().total_principal());
    println!("Window:          {} to {}", setup.start(), setup.maturity());
    println!("Grid dates:      {}", setup.dates().len());
    println!("Surface levels:  {}", setup.levels().cooked().len());
    println!("Tranches:        {}", tranches.len());
    println!("Quotes:          {}", portfolio.quotes.len());
    println!("Parallel:        {}", setup.options().parallel);
    Ok(())
}
