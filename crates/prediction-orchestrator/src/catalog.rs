use analysis_core::Market;

/// Static (symbol, name, sector) rows per market. Order is the batch order
/// used by market-wide predictions.
const US: &[(&str, &str, &str)] = &[
    ("AAPL", "Apple Inc.", "Technology"),
    ("MSFT", "Microsoft Corporation", "Technology"),
    ("GOOGL", "Alphabet Inc.", "Technology"),
    ("AMZN", "Amazon.com Inc.", "E-commerce"),
    ("TSLA", "Tesla Inc.", "Automotive"),
];

const INDIAN: &[(&str, &str, &str)] = &[
    ("RELIANCE.NS", "Reliance Industries Ltd.", "Energy"),
    ("TCS.NS", "Tata Consultancy Services Ltd.", "Information Technology"),
    ("HDFCBANK.NS", "HDFC Bank Ltd.", "Banking"),
    ("INFY.NS", "Infosys Ltd.", "Information Technology"),
    ("ITC.NS", "ITC Ltd.", "FMCG"),
];

const CRYPTO: &[(&str, &str, &str)] = &[
    ("BTC-USD", "Bitcoin", "Store of Value"),
    ("ETH-USD", "Ethereum", "Smart Contracts"),
    ("BNB-USD", "BNB", "Exchange Token"),
    ("SOL-USD", "Solana", "Smart Contracts"),
    ("ADA-USD", "Cardano", "Smart Contracts"),
];

pub const UNKNOWN_SECTOR: &str = "Unknown";

fn rows(market: Market) -> &'static [(&'static str, &'static str, &'static str)] {
    match market {
        Market::Us => US,
        Market::Indian => INDIAN,
        Market::Crypto => CRYPTO,
    }
}

fn lookup(symbol: &str, market: Market) -> Option<&'static (&'static str, &'static str, &'static str)> {
    let symbol = symbol.trim().to_uppercase();
    rows(market).iter().find(|(s, _, _)| *s == symbol)
}

/// Symbols predicted by `GET /api/predictions/<market>`.
pub fn market_symbols(market: Market) -> Vec<&'static str> {
    rows(market).iter().map(|(s, _, _)| *s).collect()
}

/// Display name, falling back to the symbol itself.
pub fn company_name(symbol: &str, market: Market) -> String {
    lookup(symbol, market)
        .map(|(_, name, _)| name.to_string())
        .unwrap_or_else(|| symbol.trim().to_uppercase())
}

pub fn sector(symbol: &str, market: Market) -> String {
    lookup(symbol, market)
        .map(|(_, _, sector)| sector.to_string())
        .unwrap_or_else(|| UNKNOWN_SECTOR.to_string())
}
