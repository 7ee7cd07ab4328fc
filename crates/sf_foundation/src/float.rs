// crates/sf_foundation/src/float.rs

//! 数值常量与稳定化辅助函数
//!
//! 分离式求解器中大量出现比值运算（`1/A`、`phiCorr/phi`、边界梯度
//! `Δφ/(|Sf|·rAUf)` 等），分母可能在零面积面、零耦合面或消失相中趋零。
//! 本模块提供统一的稳定化常量与函数，使这些运算退化为有限值而不是 NaN。

/// 小量，用于相对比较
pub const SMALL: f64 = 1e-15;

/// 极小量，用于分母稳定化
pub const VSMALL: f64 = 1e-300;

/// `VSMALL` 的平方根
pub const ROOT_VSMALL: f64 = 1e-150;

/// 大数，用作无界上限
pub const GREAT: f64 = 1e15;

/// 浮点数相等性比较的默认容差
pub const DEFAULT_EPSILON: f64 = 1e-14;

/// 安全除法的最小分母阈值
pub const SAFE_DIV_EPSILON: f64 = 1e-300;

/// 将数值的绝对值抬升到至少 `small`，保留符号
///
/// 与 `max(x, small)` 不同，负值保持为负。
#[inline]
pub fn stabilise(x: f64, small: f64) -> f64 {
    if x >= 0.0 {
        x + small
    } else {
        x - small
    }
}

/// 安全除法
///
/// 分母绝对值小于 [`SAFE_DIV_EPSILON`] 或结果非有限时返回 `fallback`。
#[inline]
pub fn safe_div(a: f64, b: f64, fallback: f64) -> f64 {
    if b.abs() < SAFE_DIV_EPSILON {
        fallback
    } else {
        let result = a / b;
        if result.is_finite() {
            result
        } else {
            fallback
        }
    }
}

/// 阶跃函数：`x >= 0` 时为 1，否则为 0
#[inline]
pub fn pos0(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        0.0
    }
}

/// 检查切片中是否全部为有限值
#[inline]
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// 近似相等比较（相对 + 绝对容差）
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    let diff = (a - b).abs();
    diff <= epsilon || diff <= epsilon * a.abs().max(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stabilise_keeps_sign() {
        assert!(stabilise(0.0, 1e-10) > 0.0);
        assert!(stabilise(-1.0, 1e-10) < -1.0);
        assert_eq!(stabilise(2.0, 0.0), 2.0);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 0.0, 0.0), 0.0);
        assert_eq!(safe_div(1.0, 2.0, 0.0), 0.5);
        assert_eq!(safe_div(f64::MAX, 1e-200, -1.0), -1.0);
    }

    #[test]
    fn test_pos0() {
        assert_eq!(pos0(0.0), 1.0);
        assert_eq!(pos0(-1e-12), 0.0);
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(1.0, 1.0 + 1e-15, 1e-14));
        assert!(!approx_eq(1.0, 1.1, 1e-3));
    }
}
