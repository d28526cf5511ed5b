//! 包装策略
//!
//! 三种基础包装：袋 (bag, +5, <10kg)、箱 (box, +20, <30kg)、膜 (film, +1, 无限制)。
//! 标签用 `+` 组合，主包装 (bag/box) 最多一个，膜可自由叠加。
//! 组合策略的附加费为各分量之和，重量校验要求每个分量都通过。

use rust_decimal::Decimal;

use super::order::OrderError;

const TAG_BAG: &str = "bag";
const TAG_BOX: &str = "box";
const TAG_FILM: &str = "film";

/// 包装策略（密封变体，无需运行时继承）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackagingStrategy {
    Bag,
    Box,
    Film,
    Composite(Vec<PackagingStrategy>),
}

impl PackagingStrategy {
    /// 包装附加费
    pub fn price(&self) -> Decimal {
        match self {
            PackagingStrategy::Bag => Decimal::from(5),
            PackagingStrategy::Box => Decimal::from(20),
            PackagingStrategy::Film => Decimal::from(1),
            PackagingStrategy::Composite(parts) => parts.iter().map(|p| p.price()).sum(),
        }
    }

    /// 重量是否可被该包装承载
    pub fn admits(&self, weight: Decimal) -> bool {
        match self {
            PackagingStrategy::Bag => weight < Decimal::from(10),
            PackagingStrategy::Box => weight < Decimal::from(30),
            PackagingStrategy::Film => true,
            PackagingStrategy::Composite(parts) => parts.iter().all(|p| p.admits(weight)),
        }
    }
}

/// 解析包装标签
///
/// 按 `+` 切分，逐个归类。第二个主包装报 `ConflictingMain`，
/// 未知标签报 `UnknownPackaging`。
pub fn parse_packaging(tag: &str) -> Result<PackagingStrategy, OrderError> {
    let mut parts = Vec::new();
    let mut main_count = 0usize;

    for token in tag.split('+') {
        let strategy = match token {
            TAG_BAG => {
                main_count += 1;
                PackagingStrategy::Bag
            }
            TAG_BOX => {
                main_count += 1;
                PackagingStrategy::Box
            }
            TAG_FILM => PackagingStrategy::Film,
            unknown => return Err(OrderError::UnknownPackaging(unknown.to_string())),
        };
        if main_count > 1 {
            return Err(OrderError::ConflictingMain);
        }
        parts.push(strategy);
    }

    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(PackagingStrategy::Composite(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn single_tags() {
        assert_eq!(parse_packaging("bag").unwrap().price(), Decimal::from(5));
        assert_eq!(parse_packaging("box").unwrap().price(), Decimal::from(20));
        assert_eq!(parse_packaging("film").unwrap().price(), Decimal::from(1));
    }

    #[test]
    fn composite_sums_prices() {
        let strategy = parse_packaging("bag+film").unwrap();
        assert_eq!(strategy.price(), Decimal::from(6));
    }

    #[test]
    fn two_mains_conflict() {
        assert_eq!(
            parse_packaging("bag+box").unwrap_err(),
            OrderError::ConflictingMain
        );
        assert_eq!(
            parse_packaging("box+film+bag").unwrap_err(),
            OrderError::ConflictingMain
        );
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            parse_packaging("crate").unwrap_err(),
            OrderError::UnknownPackaging(t) if t == "crate"
        ));
        assert!(matches!(
            parse_packaging("bag+").unwrap_err(),
            OrderError::UnknownPackaging(_)
        ));
    }

    #[test]
    fn bag_weight_limit_is_strict() {
        let bag = parse_packaging("bag").unwrap();
        assert!(bag.admits(Decimal::from_str("9.99").unwrap()));
        assert!(!bag.admits(Decimal::from(10)));
    }

    #[test]
    fn composite_admits_requires_every_part() {
        let strategy = parse_packaging("bag+film").unwrap();
        assert!(strategy.admits(Decimal::from_str("9.99").unwrap()));
        // film alone takes any weight, but the bag component caps the composite
        assert!(!strategy.admits(Decimal::from(12)));

        let film = parse_packaging("film").unwrap();
        assert!(film.admits(Decimal::from(1000)));
    }
}
