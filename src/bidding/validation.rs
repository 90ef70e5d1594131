/// 입찰 입력값 검증
/// 화면단 검증과 동일한 규칙을 서버에서 다시 적용한다.
use thiserror::Error;

/// 입찰자 이름 최소 길이 (trim 이후)
const MIN_NAME_CHARS: usize = 2;
/// 전화번호 최소 길이
const MIN_PHONE_CHARS: usize = 10;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("이름은 최소 2자 이상이어야 합니다")]
    NameTooShort,
    #[error("전화번호는 최소 10자 이상이어야 합니다")]
    PhoneTooShort,
    #[error("전화번호 형식이 올바르지 않습니다")]
    PhoneInvalidFormat,
    #[error("입찰 금액은 1 이상이어야 합니다")]
    InvalidAmount,
}

/// 입찰자 이름 검증
pub fn validate_bidder_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() < MIN_NAME_CHARS {
        return Err(ValidationError::NameTooShort);
    }
    Ok(())
}

/// 전화번호 검증: 숫자, `+`, `-`, 공백, 괄호만 허용
pub fn validate_bidder_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.chars().count() < MIN_PHONE_CHARS {
        return Err(ValidationError::PhoneTooShort);
    }
    let valid_chars = phone
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '+' | '-' | '(' | ')'));
    if !valid_chars {
        return Err(ValidationError::PhoneInvalidFormat);
    }
    Ok(())
}

/// 입찰 금액 검증
pub fn validate_bid_amount(amount: i64) -> Result<(), ValidationError> {
    if amount < 1 {
        return Err(ValidationError::InvalidAmount);
    }
    Ok(())
}

/// 입찰 입력값 전체 검증
pub fn validate_bid_input(name: &str, phone: &str, amount: i64) -> Result<(), ValidationError> {
    validate_bidder_name(name)?;
    validate_bidder_phone(phone)?;
    validate_bid_amount(amount)?;
    Ok(())
}
