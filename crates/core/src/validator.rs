//! 配置校验模块
//!
//! 纯函数，无 I/O、无共享状态。端点 URL 和凭证在落盘前都必须通过这里。

use crate::errors::ValidationError;
use url::Url;

/// 凭证最小长度
pub const MIN_CREDENTIAL_LEN: usize = 16;

/// 校验端点 URL
///
/// 规则：
/// - 必须是 https
/// - 不允许携带查询参数或片段
/// - 白名单非空时，域名必须在白名单内（大小写不敏感）；空白名单表示未配置限制
pub fn validate_endpoint_url(raw: &str, allow_list: &[String]) -> Result<(), ValidationError> {
    let parsed =
        Url::parse(raw).map_err(|_| ValidationError::MalformedUrl(raw.to_string()))?;

    if parsed.scheme() != "https" {
        return Err(ValidationError::InsecureScheme(raw.to_string()));
    }

    if parsed.query().is_some() {
        return Err(ValidationError::QueryNotAllowed(raw.to_string()));
    }

    if parsed.fragment().is_some() {
        return Err(ValidationError::FragmentNotAllowed(raw.to_string()));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| ValidationError::MissingHost(raw.to_string()))?;

    if !allow_list.is_empty()
        && !allow_list.iter().any(|d| d.eq_ignore_ascii_case(host))
    {
        return Err(ValidationError::DomainNotAllowed(host.to_string()));
    }

    Ok(())
}

/// 校验凭证形态
///
/// 只检查非空和最小长度；各 Provider 的凭证格式差异很大，不做进一步
/// 形状检查。
pub fn validate_credential(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyCredential);
    }

    if value.chars().count() < MIN_CREDENTIAL_LEN {
        return Err(ValidationError::CredentialTooShort {
            min: MIN_CREDENTIAL_LEN,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(domains: &[&str]) -> Vec<String> {
        domains.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_rejects_non_https() {
        assert_eq!(
            validate_endpoint_url("http://x.com", &[]),
            Err(ValidationError::InsecureScheme("http://x.com".to_string()))
        );
    }

    #[test]
    fn test_rejects_query_string() {
        assert_eq!(
            validate_endpoint_url("https://api.openai.com/v1?x=1", &[]),
            Err(ValidationError::QueryNotAllowed(
                "https://api.openai.com/v1?x=1".to_string()
            ))
        );
    }

    #[test]
    fn test_rejects_fragment() {
        assert!(matches!(
            validate_endpoint_url("https://api.openai.com/v1#frag", &[]),
            Err(ValidationError::FragmentNotAllowed(_))
        ));
    }

    #[test]
    fn test_rejects_domain_outside_allow_list() {
        assert_eq!(
            validate_endpoint_url("https://evil.com", &allow(&["api.openai.com"])),
            Err(ValidationError::DomainNotAllowed("evil.com".to_string()))
        );
    }

    #[test]
    fn test_accepts_allow_listed_domain() {
        assert_eq!(
            validate_endpoint_url("https://api.openai.com", &allow(&["api.openai.com"])),
            Ok(())
        );
    }

    #[test]
    fn test_empty_allow_list_means_unrestricted() {
        assert_eq!(validate_endpoint_url("https://anything.example", &[]), Ok(()));
    }

    #[test]
    fn test_domain_match_is_case_insensitive() {
        assert_eq!(
            validate_endpoint_url("https://api.openai.com", &allow(&["API.OpenAI.com"])),
            Ok(())
        );
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(matches!(
            validate_endpoint_url("not a url", &[]),
            Err(ValidationError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_credential_blank() {
        assert_eq!(validate_credential(""), Err(ValidationError::EmptyCredential));
        assert_eq!(
            validate_credential("   "),
            Err(ValidationError::EmptyCredential)
        );
    }

    #[test]
    fn test_credential_too_short() {
        assert_eq!(
            validate_credential("short-key"),
            Err(ValidationError::CredentialTooShort {
                min: MIN_CREDENTIAL_LEN
            })
        );
    }

    #[test]
    fn test_credential_minimum_length_boundary() {
        assert_eq!(validate_credential("a".repeat(15).as_str()).is_ok(), false);
        assert_eq!(validate_credential("a".repeat(16).as_str()), Ok(()));
    }
}
